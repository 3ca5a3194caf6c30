use std::io::{self, Write};
use std::path::Path;

use mirrorftp::types::{FileType, TransferFraming};
use mirrorftp::{FtpStream, Mode, TransferReport};

pub fn quit(mut ftp: Option<FtpStream>) {
    if let Some(mut ftp) = ftp.take() {
        match ftp.quit() {
            Ok(_) => println!("OK"),
            Err(err) => eprintln!("Failed to disconnect from remote: {}", err),
        }
    }
}

pub fn cdup(ftp: &mut FtpStream) {
    match ftp.cdup() {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("CDUP error: {}", err),
    }
}

pub fn connect(remote: &str) -> Option<FtpStream> {
    match FtpStream::connect(remote) {
        Ok(stream) => {
            if let Some(welcome) = stream.welcome_msg() {
                println!("{}", welcome);
            }
            println!("OK");
            Some(stream)
        }
        Err(err) => {
            eprintln!("Failed to connect to remote: {}", err);
            None
        }
    }
}

pub fn cwd(ftp: &mut FtpStream, dir: &str) {
    match ftp.cwd(dir) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("CWD error: {}", err),
    }
}

pub fn list(ftp: &mut FtpStream, p: Option<&str>) {
    match ftp.list(p) {
        Ok(files) => {
            files.iter().for_each(|f| println!("{}", f));
        }
        Err(err) => eprintln!("LIST error: {}", err),
    }
}

pub fn login(ftp: &mut FtpStream) {
    // Read username
    print!("Username: ");
    let _ = io::stdout().flush();
    let mut username = String::new();
    if let Err(err) = io::stdin().read_line(&mut username) {
        eprintln!("Could not read username: {}", err);
        return;
    }
    // Read password
    let password: String = match rpassword::prompt_password("Password: ") {
        Ok(p) => p,
        Err(err) => {
            eprintln!("Could not read password: {}", err);
            return;
        }
    };
    // Login
    match ftp.login(username.trim(), password.as_str()) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("LOGIN error: {}", err),
    }
}

pub fn mkdir(ftp: &mut FtpStream, p: &str) {
    match ftp.mkdir(p) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("MKDIR error: {}", err),
    }
}

pub fn set_mode(ftp: &mut FtpStream, mode: Mode) {
    ftp.set_mode(mode);
    println!("OK");
}

pub fn set_type(ftp: &mut FtpStream, file_type: FileType) {
    let options = ftp.options().with_file_type(file_type);
    ftp.set_options(options);
    println!("OK");
}

pub fn set_framing(ftp: &mut FtpStream, framing: TransferFraming) {
    // ask now, so that an unsupported framing is reported right away
    match ftp.transfer_framing(framing) {
        Ok(_) => {
            let options = ftp.options().with_framing(framing);
            ftp.set_options(options);
            println!("OK");
        }
        Err(err) => eprintln!("FRAMING error: {}", err),
    }
}

pub fn noop(ftp: &mut FtpStream) {
    match ftp.noop() {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("NOOP error: {}", err),
    }
}

pub fn get(ftp: &mut FtpStream, remote: &str, local: &Path) {
    match ftp.download(remote, local) {
        Ok(report) => print_report(&report),
        Err(err) => eprintln!("GET error: {}", err),
    }
}

pub fn put(ftp: &mut FtpStream, local: &Path, remote: &str) {
    match ftp.upload(local, remote) {
        Ok(report) => print_report(&report),
        Err(err) => eprintln!("PUT error: {}", err),
    }
}

pub fn pwd(ftp: &mut FtpStream) {
    match ftp.pwd() {
        Ok(p) => println!("OK: {}", p),
        Err(err) => eprintln!("PWD error: {}", err),
    }
}

pub fn rm(ftp: &mut FtpStream, file: &str) {
    match ftp.rm(file) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RM error: {}", err),
    }
}

pub fn size(ftp: &mut FtpStream, file: &str) {
    match ftp.size(file) {
        Ok(size) => println!("OK: {}", size),
        Err(err) => eprintln!("SIZE error: {}", err),
    }
}

fn print_report(report: &TransferReport) {
    for path in report.skipped() {
        println!("skipped {} (complete)", path);
    }
    for path in report.rejected() {
        eprintln!("rejected {}", path);
    }
    for failure in report.failures() {
        eprintln!("failed {}: {}", failure.path(), failure.error());
    }
    if report.is_cancelled() {
        eprintln!("cancelled");
    }
    println!(
        "OK: {} files, {} bytes",
        report.files_transferred(),
        report.bytes_transferred()
    );
}
