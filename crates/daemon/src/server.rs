//! Newline-delimited JSON-RPC loop over any reader/writer pair.

use std::io::{self, BufRead, Write};

use serde_json::Value;
use tracing::{debug, info, warn};
use yapper_core::{Domain, IndexStore, Vault};

use crate::dispatch::dispatch;
use crate::rpc::{Request, Response, RpcError};

/// Serve requests until `reader` hits EOF.
///
/// One response line per request, flushed before the next read. Lines that
/// are not UTF-8 get a parse error like malformed JSON. A client that hangs
/// up mid-write ends the loop without an error.
pub fn serve<V, S, R, W>(domain: &Domain<V, S>, mut reader: R, mut writer: W) -> io::Result<()>
where
    V: Vault,
    S: IndexStore,
    R: BufRead,
    W: Write,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) => handle_line(domain, line),
            Err(e) => {
                warn!("Request line is not UTF-8: {}", e);
                Some(Response::failure(Value::Null, &RpcError::Parse(e.to_string())))
            }
        };
        let Some(response) = response else {
            continue;
        };

        let encoded = match serde_json::to_string(&response) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode response: {}", e);
                continue;
            }
        };

        match writeln!(writer, "{encoded}").and_then(|()| writer.flush()) {
            Ok(()) => debug!("Responded with {}", encoded),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                info!("Client went away");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Process one input line. `None` means nothing is written back.
pub fn handle_line<V: Vault, S: IndexStore>(domain: &Domain<V, S>, line: &str) -> Option<Response> {
    if line.trim().is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed JSON: {}", e);
            return Some(Response::failure(Value::Null, &RpcError::Parse(e.to_string())));
        }
    };

    let request = match Request::from_value(value) {
        Ok(request) => request,
        Err((id, err)) => {
            warn!("Rejected request: {}", err);
            return Some(Response::failure(id, &err));
        }
    };

    debug!("Dispatching {}", request.method);
    let outcome = dispatch(domain, &request.method, request.params);

    match (request.id, outcome) {
        (Some(id), Ok(result)) => Some(Response::success(id, result)),
        (Some(id), Err(err)) => Some(Response::failure(id, &err)),
        (None, Ok(_)) => None,
        (None, Err(err)) => {
            warn!("Notification {} failed: {}", request.method, err);
            None
        }
    }
}

#[cfg(unix)]
pub mod socket {
    use std::fs;
    use std::io::{self, BufReader};
    use std::os::unix::net::UnixListener;
    use std::path::Path;

    use tracing::{info, warn};
    use yapper_core::{Domain, IndexStore, Vault};

    use super::serve;

    /// Bind `path`, replacing a stale socket file left by an earlier run.
    pub fn bind(path: &Path) -> io::Result<UnixListener> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        info!("Listening on {}", path.display());
        Ok(listener)
    }

    /// Accept connections forever, serving each to completion in turn.
    pub fn run<V: Vault, S: IndexStore>(domain: &Domain<V, S>, listener: &UnixListener) {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            info!("Client connected");

            let reader = match stream.try_clone() {
                Ok(clone) => BufReader::new(clone),
                Err(e) => {
                    warn!("Failed to clone socket stream: {}", e);
                    continue;
                }
            };
            match serve(domain, reader, &stream) {
                Ok(()) => info!("Client disconnected"),
                Err(e) => warn!("Connection ended with error: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::{TempDir, tempdir};
    use yapper_core::{
        DomainOptions, FileSystemVault, InMemoryIndexStore, ParserStrategy, VaultIndexManager,
    };

    use super::*;

    type TestDomain = Domain<FileSystemVault, InMemoryIndexStore>;

    fn domain() -> (TempDir, TestDomain) {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("2024-05-02.md"), "## Tasks\n- [ ] One #a [T-1]\n").unwrap();
        let vault = Arc::new(FileSystemVault::new(tmp.path()).unwrap());
        let manager = VaultIndexManager::new(
            vault,
            Arc::new(InMemoryIndexStore::new()),
            ParserStrategy::Regex.build(),
        );
        let domain = Domain::new(manager, DomainOptions::default());
        domain.reindex_all().unwrap();
        (tmp, domain)
    }

    fn run(domain: &TestDomain, input: &str) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        serve(domain, input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn responses_follow_request_order() {
        let (_tmp, domain) = domain();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"core.list_tags"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":"two","method":"core.task_detail","params":{"task_id":"T-1"}}"#,
            "\n",
        );
        let responses = run(&domain, input);
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0], json!({ "jsonrpc": "2.0", "id": 1, "result": ["a"] }));
        assert_eq!(responses[1]["id"], "two");
        assert_eq!(responses[1]["result"]["task"]["id"], "T-1");
    }

    #[test]
    fn malformed_lines_do_not_stop_the_loop() {
        let (_tmp, domain) = domain();
        let input = concat!(
            "{not json\n",
            r#"{"jsonrpc":"2.0","id":2}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"core.list_tags"}"#,
            "\n",
        );
        let responses = run(&domain, input);
        assert_eq!(responses[0]["id"], serde_json::Value::Null);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["error"]["code"], -32600);
        assert_eq!(responses[2]["result"], json!(["a"]));
    }

    #[test]
    fn invalid_utf8_line_is_a_parse_error() {
        let (_tmp, domain) = domain();
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"core.list_tags"}"#);
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":3,"method":"core.list_tags"}"#);

        let mut out = Vec::new();
        serve(&domain, input.as_slice(), &mut out).unwrap();
        let responses: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], serde_json::Value::Null);
        assert_eq!(responses[1]["error"]["code"], -32700);
        assert_eq!(responses[2]["id"], 3);
        assert_eq!(responses[2]["result"], json!(["a"]));
    }

    #[test]
    fn notifications_get_no_reply() {
        let (_tmp, domain) = domain();
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"core.reindex"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"core.nope"}"#,
            "\n",
        );
        assert!(run(&domain, input).is_empty());
    }

    #[test]
    fn null_id_is_still_answered() {
        let (_tmp, domain) = domain();
        let line = serde_json::to_string(
            &handle_line(&domain, r#"{"jsonrpc":"2.0","id":null,"method":"core.list_tags"}"#)
                .unwrap(),
        )
        .unwrap();
        insta::assert_snapshot!(line, @r#"{"jsonrpc":"2.0","id":null,"result":["a"]}"#);
    }
}
