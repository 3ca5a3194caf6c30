//! # mirrorftp Client
//!
//! This is a client you can install via `cargo install mirrorftp-cli` on your system to connect to FTP servers
//! and mirror directory trees from and to them
//!

// -- mods
mod actions;
mod args;
mod command;

use std::io;
use std::io::Write;
use std::str::FromStr;

use actions::*;
use args::Args;
use command::Command;
use env_logger::Builder as LogBuilder;
use log::LevelFilter;
use mirrorftp::FtpStream;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

fn usage() {
    println!("Available commands:");
    println!("CDUP                                Go to parent directory");
    println!("CONNECT <addr:port>                 Connect to remote host");
    println!("CWD <dir>                           Change working directory");
    println!("FRAMING <STREAM|BLOCK|COMPRESSED>   Set transfer framing");
    println!("GET <remote> <local>                Download file or directory `remote` to `local`, resuming partial files");
    println!("HELP                                Print this help");
    println!("LIST [dir]                          List files. If directory is not provided, current directory is used");
    println!("LOGIN                               Login to remote");
    println!("MKDIR <dir>                         Create directory");
    println!("MODE <PASSIVE|ACTIVE>               Set data connection mode");
    println!("NOOP                                Ping server");
    println!("PUT <local> <remote>                Upload file or directory `local` to `remote`, resuming partial files");
    println!("PWD                                 Print working directory");
    println!("QUIT                                Quit mirrorftp");
    println!("RM <file>                           Remove file");
    println!("SIZE <file>                         Get `file` size");
    println!("TYPE <ASCII|BINARY>                 Set transfer type");
}

fn input() -> Command {
    loop {
        print!(">> ");
        let _ = io::stdout().flush();
        let mut input: String = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => return Command::Quit,
            Ok(_) => {}
            Err(err) => {
                eprintln!("Failed to read stdin: {}", err);
                return Command::Quit;
            }
        }
        // Try to create command
        match Command::from_str(input.as_str()) {
            Ok(cmd) => return cmd,
            Err(err) => println!("{}", err),
        }
    }
}

fn main() {
    let args: Args = argh::from_env();
    // print version
    if args.version {
        println!("mirrorftp {APP_VERSION} - developed by {APP_AUTHORS}")
    }
    // init logger
    LogBuilder::new()
        .filter_level(if args.debug {
            LevelFilter::Trace
        } else if args.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Off
        })
        .init();
    // Main loop
    let mut ftp: Option<FtpStream> = None;

    // connect if host is specified
    if let Some(host) = args.host {
        perform(&mut ftp, Command::Connect(host));
    }

    loop {
        match input() {
            Command::Quit => {
                // Break if quit
                quit(ftp);
                break;
            }
            Command::Help => usage(),
            cmd => perform(&mut ftp, cmd),
        }
    }
}

fn perform(ftp: &mut Option<FtpStream>, command: Command) {
    match ftp {
        Some(ftp) => perform_connected(ftp, command),
        None => {
            if let Some(stream) = perform_uninitialized(command) {
                *ftp = Some(stream);
            }
        }
    }
}

fn perform_uninitialized(command: Command) -> Option<FtpStream> {
    match command {
        Command::Connect(remote) => connect(remote.as_str()),
        _ => {
            eprintln!("Can't perform command: you must connect to remote first");
            None
        }
    }
}

fn perform_connected(ftp: &mut FtpStream, command: Command) {
    match command {
        Command::Cdup => cdup(ftp),
        Command::Connect(remote) => {
            if let Some(stream) = connect(remote.as_str()) {
                let _ = ftp.quit();
                *ftp = stream;
            }
        }
        Command::Cwd(dir) => cwd(ftp, dir.as_str()),
        Command::Framing(framing) => set_framing(ftp, framing),
        Command::Get(remote, local) => get(ftp, remote.as_str(), local.as_path()),
        Command::List(p) => list(ftp, p.as_deref()),
        Command::Login => login(ftp),
        Command::Mkdir(p) => mkdir(ftp, p.as_str()),
        Command::Mode(m) => set_mode(ftp, m),
        Command::Noop => noop(ftp),
        Command::Put(local, remote) => put(ftp, local.as_path(), remote.as_str()),
        Command::Pwd => pwd(ftp),
        Command::Rm(file) => rm(ftp, file.as_str()),
        Command::Size(file) => size(ftp, file.as_str()),
        Command::Type(file_type) => set_type(ftp, file_type),
        Command::Help | Command::Quit => {
            eprintln!("Something unexpected happened")
        }
    }
}
