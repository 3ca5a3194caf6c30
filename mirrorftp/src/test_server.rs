//! # Test server
//!
//! In-process FTP server used by tests. Files live in memory; every command line
//! received is recorded so tests can assert on the exact wire traffic.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::FtpStream;

pub const TEST_USER: &str = "test";
pub const TEST_PASSWORD: &str = "test";

#[derive(Default)]
struct ServerState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    symlinks: BTreeMap<String, String>,
    denied: BTreeSet<String>,
    commands: Vec<String>,
    bad_pasv: usize,
    advertised_ip: Option<Ipv4Addr>,
    reject_rest: bool,
    reject_size: bool,
    extra_lines: BTreeMap<String, Vec<String>>,
    active_connect_delay: Option<Duration>,
}

/// A mock FTP server listening on a random local port
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<Mutex<ServerState>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(ServerState::default()));
        state.lock().unwrap().dirs.insert("/".to_string());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let state = state.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else {
                        continue;
                    };
                    let state = state.clone();
                    thread::spawn(move || {
                        if let Err(err) = Session::new(state).run(stream) {
                            debug!("test server session ended: {err}");
                        }
                    });
                }
            })
        };

        Self {
            addr,
            state,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connect and log in as the test user
    pub fn connect(&self) -> FtpStream {
        let mut stream = FtpStream::connect(self.addr).unwrap();
        stream.login(TEST_USER, TEST_PASSWORD).unwrap();
        stream
    }

    pub fn add_dir(&self, path: &str) {
        self.state().dirs.insert(path.to_string());
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        self.state().files.insert(path.to_string(), content.to_vec());
    }

    pub fn add_symlink(&self, path: &str, target: &str) {
        self.state()
            .symlinks
            .insert(path.to_string(), target.to_string());
    }

    /// Every access to `path` is answered with 550
    pub fn deny(&self, path: &str) {
        self.state().denied.insert(path.to_string());
    }

    /// The next `count` PASV replies are malformed
    pub fn set_bad_pasv(&self, count: usize) {
        self.state().bad_pasv = count;
    }

    /// Advertise `ip` in PASV replies instead of the listening address
    pub fn set_advertised_ip(&self, ip: Ipv4Addr) {
        self.state().advertised_ip = Some(ip);
    }

    pub fn set_reject_rest(&self, reject: bool) {
        self.state().reject_rest = reject;
    }

    pub fn set_reject_size(&self, reject: bool) {
        self.state().reject_size = reject;
    }

    /// Append a raw line to the listing of `dir`
    pub fn add_listing_line(&self, dir: &str, line: &str) {
        self.state()
            .extra_lines
            .entry(dir.to_string())
            .or_default()
            .push(line.to_string());
    }

    /// Wait before connecting to the client in active mode
    pub fn set_active_connect_delay(&self, delay: Option<Duration>) {
        self.state().active_connect_delay = delay;
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state().dirs.contains(path)
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    /// Recorded commands starting with `verb`
    pub fn commands_with(&self, verb: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .collect()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // wake up the accept loop
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

enum DataSetup {
    Passive(TcpListener),
    Active(SocketAddr),
}

impl DataSetup {
    fn open(self, active_delay: Option<Duration>) -> io::Result<TcpStream> {
        match self {
            Self::Passive(listener) => listener.accept().map(|(stream, _)| stream),
            Self::Active(addr) => {
                if let Some(delay) = active_delay {
                    thread::sleep(delay);
                }
                TcpStream::connect(addr)
            }
        }
    }
}

struct Session {
    state: Arc<Mutex<ServerState>>,
    cwd: String,
    user: Option<String>,
    logged_in: bool,
    data: Option<DataSetup>,
    rest: u64,
}

impl Session {
    fn new(state: Arc<Mutex<ServerState>>) -> Self {
        Self {
            state,
            cwd: "/".to_string(),
            user: None,
            logged_in: false,
            data: None,
            rest: 0,
        }
    }

    fn run(mut self, stream: TcpStream) -> io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;
        writer.write_all(b"220-Welcome to the mirrorftp test server\r\n220 Ready\r\n")?;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            self.state.lock().unwrap().commands.push(line.clone());
            let (verb, arg) = match line.split_once(' ') {
                Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
                None => (line.to_ascii_uppercase(), String::new()),
            };
            if verb == "QUIT" {
                reply(&mut writer, "221 Goodbye")?;
                return Ok(());
            }
            if !self.logged_in && !matches!(verb.as_str(), "USER" | "PASS" | "NOOP") {
                reply(&mut writer, "530 Not logged in")?;
                continue;
            }
            self.dispatch(&verb, &arg, &mut writer)?;
        }
    }

    fn dispatch(&mut self, verb: &str, arg: &str, writer: &mut TcpStream) -> io::Result<()> {
        match verb {
            "USER" => {
                self.user = Some(arg.to_string());
                reply(writer, "331 User name okay, need password")
            }
            "PASS" => {
                if self.user.as_deref() == Some(TEST_USER) && arg == TEST_PASSWORD {
                    self.logged_in = true;
                    reply(writer, "230 User logged in, proceed")
                } else {
                    reply(writer, "530 Login incorrect")
                }
            }
            "NOOP" => reply(writer, "200 NOOP ok"),
            "TYPE" => match arg {
                "A" | "I" => reply(writer, &format!("200 Type set to {arg}")),
                _ => reply(writer, "504 Type not supported"),
            },
            "MODE" => match arg {
                "S" => reply(writer, "200 Mode set to S"),
                _ => reply(writer, "504 Only stream mode is supported"),
            },
            "PASV" => self.pasv(writer),
            "PORT" => self.port(arg, writer),
            "REST" => self.rest(arg, writer),
            "RETR" => self.retr(arg, writer),
            "STOR" => self.stor(arg, writer),
            "LIST" => self.list(arg, writer),
            "CWD" => {
                let path = self.resolve(arg);
                match self.directory(&path) {
                    Some(dir) => {
                        self.cwd = dir;
                        reply(writer, "250 Directory changed")
                    }
                    None => reply(writer, "550 No such directory"),
                }
            }
            "CDUP" => {
                self.cwd = parent(&self.cwd);
                reply(writer, "250 Directory changed")
            }
            "PWD" => reply(
                writer,
                &format!("257 \"{}\" is the current directory", self.cwd),
            ),
            "MKD" => {
                let path = self.resolve(arg);
                let mut state = self.state.lock().unwrap();
                if state.denied.contains(&path)
                    || state.dirs.contains(&path)
                    || state.files.contains_key(&path)
                    || !state.dirs.contains(&parent(&path))
                {
                    drop(state);
                    reply(writer, "550 Cannot create directory")
                } else {
                    state.dirs.insert(path.clone());
                    drop(state);
                    reply(writer, &format!("257 \"{path}\" created"))
                }
            }
            "SIZE" => {
                let path = self.resolve(arg);
                let state = self.state.lock().unwrap();
                let size = state
                    .files
                    .get(&path)
                    .filter(|_| !state.denied.contains(&path) && !state.reject_size)
                    .map(Vec::len);
                drop(state);
                match size {
                    Some(size) => reply(writer, &format!("213 {size}")),
                    None => reply(writer, "550 Could not get file size"),
                }
            }
            "DELE" => {
                let path = self.resolve(arg);
                let removed = self.state.lock().unwrap().files.remove(&path).is_some();
                if removed {
                    reply(writer, "250 File deleted")
                } else {
                    reply(writer, "550 No such file")
                }
            }
            _ => reply(writer, "502 Command not implemented"),
        }
    }

    fn pasv(&mut self, writer: &mut TcpStream) -> io::Result<()> {
        let (bad, advertised) = {
            let mut state = self.state.lock().unwrap();
            let bad = state.bad_pasv > 0;
            if bad {
                state.bad_pasv -= 1;
            }
            (bad, state.advertised_ip)
        };
        if bad {
            return reply(writer, "227 Entering Passive Mode (127,0,0,1)");
        }
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let [h1, h2, h3, h4] = advertised.unwrap_or(Ipv4Addr::LOCALHOST).octets();
        self.data = Some(DataSetup::Passive(listener));
        reply(
            writer,
            &format!(
                "227 Entering Passive Mode ({h1},{h2},{h3},{h4},{},{})",
                port / 256,
                port % 256
            ),
        )
    }

    fn port(&mut self, arg: &str, writer: &mut TcpStream) -> io::Result<()> {
        let fields: Vec<u8> = arg.split(',').filter_map(|f| f.parse().ok()).collect();
        if fields.len() != 6 {
            return reply(writer, "501 Bad PORT argument");
        }
        let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
        let port = u16::from(fields[4]) * 256 + u16::from(fields[5]);
        self.data = Some(DataSetup::Active(SocketAddr::new(ip.into(), port)));
        reply(writer, "200 PORT command successful")
    }

    fn rest(&mut self, arg: &str, writer: &mut TcpStream) -> io::Result<()> {
        if self.state.lock().unwrap().reject_rest {
            return reply(writer, "502 REST not implemented");
        }
        match arg.parse() {
            Ok(offset) => {
                self.rest = offset;
                reply(writer, &format!("350 Restarting at {offset}"))
            }
            Err(_) => reply(writer, "501 Bad offset"),
        }
    }

    fn retr(&mut self, arg: &str, writer: &mut TcpStream) -> io::Result<()> {
        let path = self.resolve(arg);
        let offset = std::mem::take(&mut self.rest);
        let content = {
            let state = self.state.lock().unwrap();
            state
                .files
                .get(&path)
                .filter(|_| !state.denied.contains(&path))
                .cloned()
        };
        let Some(content) = content else {
            self.data = None;
            return reply(writer, "550 No such file");
        };
        let Some(setup) = self.data.take() else {
            return reply(writer, "425 Use PORT or PASV first");
        };
        reply(writer, "150 Opening data connection")?;
        let Some(mut data) = self.open_data(setup) else {
            return reply(writer, "425 Can't open data connection");
        };
        let start = (offset as usize).min(content.len());
        data.write_all(&content[start..])?;
        drop(data);
        reply(writer, "226 Transfer complete")
    }

    fn stor(&mut self, arg: &str, writer: &mut TcpStream) -> io::Result<()> {
        let path = self.resolve(arg);
        let offset = std::mem::take(&mut self.rest);
        let allowed = {
            let state = self.state.lock().unwrap();
            !state.denied.contains(&path)
                && !state.dirs.contains(&path)
                && state.dirs.contains(&parent(&path))
        };
        if !allowed {
            self.data = None;
            return reply(writer, "550 Cannot store file");
        }
        let Some(setup) = self.data.take() else {
            return reply(writer, "425 Use PORT or PASV first");
        };
        reply(writer, "150 Opening data connection")?;
        let Some(mut data) = self.open_data(setup) else {
            return reply(writer, "425 Can't open data connection");
        };
        let mut received = Vec::new();
        data.read_to_end(&mut received)?;
        drop(data);
        {
            let mut state = self.state.lock().unwrap();
            let file = state.files.entry(path).or_default();
            file.truncate(offset as usize);
            file.extend_from_slice(&received);
        }
        reply(writer, "226 Transfer complete")
    }

    fn list(&mut self, arg: &str, writer: &mut TcpStream) -> io::Result<()> {
        let path = if arg.is_empty() {
            self.cwd.clone()
        } else {
            self.resolve(arg)
        };
        let Some(lines) = self.listing(&path) else {
            self.data = None;
            return reply(writer, "550 No such file or directory");
        };
        let Some(setup) = self.data.take() else {
            return reply(writer, "425 Use PORT or PASV first");
        };
        reply(writer, "150 Here comes the directory listing")?;
        let Some(mut data) = self.open_data(setup) else {
            return reply(writer, "425 Can't open data connection");
        };
        data.write_all(format!("total {}\r\n", lines.len()).as_bytes())?;
        for line in lines {
            data.write_all(format!("{line}\r\n").as_bytes())?;
        }
        drop(data);
        reply(writer, "226 Directory send OK")
    }

    fn open_data(&self, setup: DataSetup) -> Option<TcpStream> {
        let delay = self.state.lock().unwrap().active_connect_delay;
        match setup.open(delay) {
            Ok(stream) => Some(stream),
            Err(err) => {
                debug!("test server could not open data connection: {err}");
                None
            }
        }
    }

    fn listing(&self, path: &str) -> Option<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.denied.contains(path) {
            return None;
        }
        if let Some(content) = state.files.get(path) {
            return Some(vec![file_line(name(path), content.len())]);
        }
        let dir = match state.symlinks.get(path) {
            Some(target) => target.clone(),
            None => path.to_string(),
        };
        if !state.dirs.contains(&dir) {
            return None;
        }
        let mut entries: BTreeMap<&str, String> = BTreeMap::new();
        entries.insert(".", dir_line("."));
        entries.insert("..", dir_line(".."));
        for child in state.dirs.iter().filter(|d| is_child(&dir, d)) {
            entries.insert(name(child), dir_line(name(child)));
        }
        for (child, content) in state.files.iter().filter(|(f, _)| is_child(&dir, f)) {
            entries.insert(name(child), file_line(name(child), content.len()));
        }
        for (child, target) in state.symlinks.iter().filter(|(l, _)| is_child(&dir, l)) {
            entries.insert(
                name(child),
                format!(
                    "lrwxrwxrwx 1 user group {} Jan 5 10:00 {} -> {target}",
                    target.len(),
                    name(child)
                ),
            );
        }
        let mut lines: Vec<String> = entries.into_values().collect();
        if let Some(extra) = state.extra_lines.get(&dir) {
            lines.extend(extra.iter().cloned());
        }
        Some(lines)
    }

    /// Resolve `path` to a directory, following symlinks
    fn directory(&self, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        if state.denied.contains(path) {
            return None;
        }
        let path = state
            .symlinks
            .get(path)
            .cloned()
            .unwrap_or_else(|| path.to_string());
        state.dirs.contains(&path).then_some(path)
    }

    fn resolve(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{path}", self.cwd)
        };
        let mut parts: Vec<&str> = Vec::new();
        for part in joined.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                part => parts.push(part),
            }
        }
        let path = format!("/{}", parts.join("/"));
        // follow a symlinked directory in the middle of the path
        let state = self.state.lock().unwrap();
        for (link, target) in state.symlinks.iter() {
            if let Some(rest) = path.strip_prefix(&format!("{link}/")) {
                return format!("{target}/{rest}");
            }
        }
        path
    }
}

fn reply(writer: &mut TcpStream, line: &str) -> io::Result<()> {
    writer.write_all(format!("{line}\r\n").as_bytes())
}

fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_child(dir: &str, path: &str) -> bool {
    path != "/" && parent(path) == dir
}

fn dir_line(name: &str) -> String {
    format!("drwxr-xr-x 2 user group 4096 Jan 5 10:00 {name}")
}

fn file_line(name: &str, size: usize) -> String {
    format!("-rw-r--r-- 1 user group {size} Mar 15 2021 {name}")
}
