#![cfg(unix)]

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tempfile::tempdir;

struct KillOnDrop(Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn connect(path: &std::path::Path) -> UnixStream {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match UnixStream::connect(path) {
            Ok(stream) => return stream,
            Err(e) if Instant::now() > deadline => panic!("daemon never listened: {e}"),
            Err(_) => thread::sleep(Duration::from_millis(50)),
        }
    }
}

fn call(stream: &mut UnixStream, id: u64, method: &str, params: Value) -> Value {
    let line = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
    writeln!(stream, "{line}").unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut response = String::new();
    reader.read_line(&mut response).unwrap();
    serde_json::from_str(&response).unwrap()
}

#[test]
fn serves_consecutive_clients_and_replaces_stale_socket() {
    let tmp = tempdir().unwrap();
    let vault = tmp.path().join("vault");
    fs::create_dir_all(&vault).unwrap();
    fs::write(vault.join("2024-05-02.md"), "## Tasks\n- [ ] Call bank #home [T-7]\n").unwrap();

    let socket = tmp.path().join("yapper.sock");
    fs::write(&socket, "stale").unwrap();

    let child = Command::new(assert_cmd::cargo::cargo_bin!("yapperd"))
        .env("XDG_CONFIG_HOME", tmp.path())
        .env_remove("YAPPER_VAULT")
        .env_remove("YAPPER_LOG")
        .args(["--vault", vault.to_str().unwrap(), "--socket", socket.to_str().unwrap()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let _guard = KillOnDrop(child);

    let mut first = connect(&socket);
    let tags = call(&mut first, 1, "core.list_tags", json!({}));
    assert_eq!(tags["result"], json!(["home"]));
    drop(first);

    let mut second = connect(&socket);
    let detail = call(&mut second, 2, "core.task_detail", json!({ "task_id": "T-7" }));
    assert_eq!(detail["id"], 2);
    assert_eq!(detail["result"]["task"]["title"], "Call bank");
}
