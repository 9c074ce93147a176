//! Session integration tests
//!
//! Each test scripts a mock FTP server on a loopback listener and
//! drives a real `Session` against it, covering login, negotiation,
//! transfers with resume, and the error paths shells depend on.

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use rax_ftp_client::Session;
use rax_ftp_client::config::ClientConfig;
use rax_ftp_client::error::{FtpError, NegotiationError};

/// Control-connection end of the scripted server.
struct Wire {
    reader: BufReader<TcpStream>,
    stream: TcpStream,
}

impl Wire {
    fn new(stream: TcpStream) -> Self {
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self { reader, stream }
    }

    fn send(&mut self, line: &str) {
        self.stream
            .write_all(format!("{}\r\n", line).as_bytes())
            .unwrap();
    }

    fn recv(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        line.trim_end().to_string()
    }

    fn expect(&mut self, expected: &str) {
        let got = self.recv();
        assert_eq!(got, expected);
    }
}

/// Binds a loopback control listener, greets with 220 and hands the
/// connection to the script on its own thread.
fn spawn_server(script: impl FnOnce(Wire) + Send + 'static) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut wire = Wire::new(stream);
        wire.send("220 rax test server ready");
        script(wire);
    });
    (addr, handle)
}

fn test_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        connect_timeout_secs: 5,
        data_timeout_secs: 5,
        buffer_size: 4096,
    }
}

fn expect_login(wire: &mut Wire) {
    wire.expect("USER tester");
    wire.send("331 password required");
    wire.expect("PASS secret");
    wire.send("230 login ok");
}

/// Answers PASV with a freshly bound data listener and returns it.
fn answer_pasv(wire: &mut Wire) -> TcpListener {
    let data = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = data.local_addr().unwrap().port();
    wire.expect("PASV");
    wire.send(&format!(
        "227 Entering Passive Mode (127,0,0,1,{},{})",
        port / 256,
        port % 256
    ));
    data
}

fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("rax-ftp-client-{}-{}", std::process::id(), name));
    path
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_login_success_and_quit() {
    let (addr, handle) = spawn_server(|mut wire| {
        expect_login(&mut wire);
        wire.expect("QUIT");
        wire.send("221 goodbye");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    assert_eq!(session.greeting().code, 220);
    session.login("tester", "secret").unwrap();
    let farewell = session.quit().unwrap();
    assert_eq!(farewell.code, 221);
    handle.join().unwrap();
}

#[test]
fn test_login_rejected_attempts_nothing_further() {
    let (addr, handle) = spawn_server(|mut wire| {
        wire.expect("USER tester");
        wire.send("331 password required");
        wire.expect("PASS wrong");
        wire.send("530 denied");
        // The client must go quiet; the next read sees only EOF.
        let mut rest = String::new();
        wire.reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    let err = session.login("tester", "wrong").unwrap_err();
    match err {
        FtpError::Protocol { code, .. } => assert_eq!(code, 530),
        other => panic!("expected protocol error, got {:?}", other),
    }
    drop(session);
    handle.join().unwrap();
}

#[test]
fn test_list_auto_enters_passive_and_filters_total_line() {
    let (addr, handle) = spawn_server(|mut wire| {
        expect_login(&mut wire);
        let data = answer_pasv(&mut wire);
        wire.expect("LIST");
        wire.send("150 here it comes");
        let (mut conn, _) = data.accept().unwrap();
        conn.write_all(b"total 2\r\nfile-a.txt\r\nfile-b.txt\r\n")
            .unwrap();
        drop(conn);
        wire.send("226 transfer complete");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    session.login("tester", "secret").unwrap();
    assert!(session.mode().is_none());

    let lines = session.list(None).unwrap();
    assert_eq!(lines, vec!["file-a.txt", "file-b.txt"]);
    // The listing spent the auto-negotiated mode.
    assert!(session.mode().is_none());
    handle.join().unwrap();
}

#[test]
fn test_active_mode_retrieve_and_mode_exclusivity() {
    let (addr, handle) = spawn_server(|mut wire| {
        expect_login(&mut wire);
        // First negotiation: passive, immediately replaced below.
        let _replaced = answer_pasv(&mut wire);

        let port_line = wire.recv();
        assert!(
            port_line.starts_with("PORT 127,0,0,1,"),
            "unexpected PORT line: {}",
            port_line
        );
        let fields: Vec<u16> = port_line
            .strip_prefix("PORT ")
            .unwrap()
            .split(',')
            .map(|field| field.parse().unwrap())
            .collect();
        let data_port = fields[4] * 256 + fields[5];
        wire.send("200 port ok");

        wire.expect("RETR hello.txt");
        wire.send("150 opening");
        let mut conn = TcpStream::connect(("127.0.0.1", data_port)).unwrap();
        conn.write_all(b"hello over ftp").unwrap();
        drop(conn);
        wire.send("226 done");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    session.login("tester", "secret").unwrap();

    session.enter_passive().unwrap();
    assert!(session.mode().is_passive());
    // Entering active replaces the passive endpoint wholesale.
    session.enter_active(Ipv4Addr::new(127, 0, 0, 1), 0).unwrap();
    assert!(session.mode().is_active());
    assert!(!session.mode().is_passive());

    let local = temp_path("active-download");
    let moved = session
        .retrieve("hello.txt", &local, &mut |_, _| {})
        .unwrap();
    assert_eq!(moved, 14);
    assert_eq!(fs::read(&local).unwrap(), b"hello over ftp");
    assert!(session.mode().is_none());

    let _ = fs::remove_file(&local);
    handle.join().unwrap();
}

#[test]
fn test_resume_download_appends_exactly_the_remaining_bytes() {
    let full = pattern(5000);
    let local = temp_path("resume-download");
    fs::write(&local, &full[..1000]).unwrap();

    let (addr, handle) = spawn_server(|mut wire| {
        expect_login(&mut wire);
        let data = answer_pasv(&mut wire);
        wire.expect("SIZE big.bin");
        wire.send("213 5000");
        wire.expect("REST 1000");
        wire.send("350 restarting at 1000");
        wire.expect("RETR big.bin");
        wire.send("150 opening");
        let (mut conn, _) = data.accept().unwrap();
        conn.write_all(&pattern(5000)[1000..]).unwrap();
        drop(conn);
        wire.send("226 done");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    session.login("tester", "secret").unwrap();
    session.enter_passive().unwrap();

    let mut last_progress = (0u64, 0u64);
    let moved = session
        .retrieve_resumable("big.bin", &local, &mut |moved, total| {
            last_progress = (moved, total)
        })
        .unwrap();

    assert_eq!(moved, 5000);
    assert_eq!(last_progress, (5000, 5000));
    assert_eq!(fs::read(&local).unwrap(), full);
    assert!(session.mode().is_none());

    let _ = fs::remove_file(&local);
    handle.join().unwrap();
}

#[test]
fn test_resource_locked_leaves_control_channel_usable() {
    let (addr, handle) = spawn_server(|mut wire| {
        expect_login(&mut wire);
        let _data = answer_pasv(&mut wire);
        wire.expect("RETR locked.txt");
        wire.send("450 requested file action not taken, file busy");
        wire.expect("NOOP");
        wire.send("200 ok");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    session.login("tester", "secret").unwrap();
    session.enter_passive().unwrap();

    let local = temp_path("locked-download");
    let err = session
        .retrieve("locked.txt", &local, &mut |_, _| {})
        .unwrap_err();
    match err {
        FtpError::ResourceLocked { code, .. } => assert_eq!(code, 450),
        other => panic!("expected resource-locked error, got {:?}", other),
    }
    assert!(session.mode().is_none());

    // The session stays usable for the next command.
    let reply = session.execute("NOOP").unwrap();
    assert_eq!(reply.code, 200);
    handle.join().unwrap();
}

#[test]
fn test_upload_resume_sends_no_rest_when_remote_is_complete() {
    let payload = pattern(2000);
    let local = temp_path("upload-complete");
    fs::write(&local, &payload).unwrap();

    let (addr, handle) = spawn_server(|mut wire| {
        expect_login(&mut wire);
        let data = answer_pasv(&mut wire);
        wire.expect("SIZE up.bin");
        wire.send("213 2000");
        // Reported size equals the local size: the very next command
        // must be STOR, never REST.
        wire.expect("STOR up.bin");
        wire.send("150 opening");
        let (mut conn, _) = data.accept().unwrap();
        let mut received = Vec::new();
        conn.read_to_end(&mut received).unwrap();
        assert_eq!(received, pattern(2000));
        drop(conn);
        wire.send("226 done");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    session.login("tester", "secret").unwrap();
    session.enter_passive().unwrap();

    let moved = session
        .store_resumable(&local, "up.bin", &mut |_, _| {})
        .unwrap();
    assert_eq!(moved, 2000);
    assert!(session.mode().is_none());

    let _ = fs::remove_file(&local);
    handle.join().unwrap();
}

#[test]
fn test_upload_resume_continues_from_reported_offset() {
    let payload = pattern(2000);
    let local = temp_path("upload-partial");
    fs::write(&local, &payload).unwrap();

    let (addr, handle) = spawn_server(|mut wire| {
        expect_login(&mut wire);
        let data = answer_pasv(&mut wire);
        wire.expect("SIZE up.bin");
        wire.send("213 800");
        wire.expect("REST 800");
        wire.send("350 restarting at 800");
        wire.expect("STOR up.bin");
        wire.send("150 opening");
        let (mut conn, _) = data.accept().unwrap();
        let mut received = Vec::new();
        conn.read_to_end(&mut received).unwrap();
        assert_eq!(received, pattern(2000)[800..].to_vec());
        drop(conn);
        wire.send("226 done");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    session.login("tester", "secret").unwrap();
    session.enter_passive().unwrap();

    let mut last_progress = (0u64, 0u64);
    let moved = session
        .store_resumable(&local, "up.bin", &mut |moved, total| {
            last_progress = (moved, total)
        })
        .unwrap();
    assert_eq!(moved, 2000);
    assert_eq!(last_progress, (2000, 2000));

    let _ = fs::remove_file(&local);
    handle.join().unwrap();
}

#[test]
fn test_transfer_without_mode_is_rejected_before_any_command() {
    let (addr, handle) = spawn_server(|mut wire| {
        expect_login(&mut wire);
        // Nothing between login and QUIT: the refused transfer must
        // not have touched the wire.
        wire.expect("QUIT");
        wire.send("221 goodbye");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    session.login("tester", "secret").unwrap();

    let local = temp_path("no-mode-download");
    let err = session
        .retrieve("anything.txt", &local, &mut |_, _| {})
        .unwrap_err();
    assert!(matches!(
        err,
        FtpError::Negotiation(NegotiationError::ModeNotSet)
    ));

    session.quit().unwrap();
    handle.join().unwrap();
}

#[test]
fn test_dead_passive_endpoint_times_out_and_resets_mode() {
    let (addr, handle) = spawn_server(|mut wire| {
        expect_login(&mut wire);
        wire.expect("PASV");
        // Advertise a port nothing listens on.
        let dead_port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        wire.send(&format!(
            "227 Entering Passive Mode (127,0,0,1,{},{})",
            dead_port / 256,
            dead_port % 256
        ));
        wire.expect("RETR x.bin");
        wire.send("150 opening");
    });

    let mut session = Session::connect(&test_config(addr)).unwrap();
    session.login("tester", "secret").unwrap();
    session.enter_passive().unwrap();

    let local = temp_path("timeout-download");
    let err = session
        .retrieve("x.bin", &local, &mut |_, _| {})
        .unwrap_err();
    assert!(matches!(err, FtpError::Timeout(_)));
    assert!(session.mode().is_none());

    let _ = fs::remove_file(&local);
    handle.join().unwrap();
}
