//! Keep-alive request flow demonstration.
//!
//! This example walks one proxy connection through three requests:
//! 1. A request forwarded for a client over https
//! 2. A plain request on the same connection (no identity leaks over)
//! 3. A request whose handler fails (identity is still restored)
//!
//! It then shows a direct connection from an untrusted peer being rejected.
//!
//! Run with: `cargo run --example keepalive_flow`

use std::panic::{self, AssertUnwindSafe};

use proxy_identity::web::{process, RequestAdapter};
use proxy_identity::{Connection, IdentityGate, ProxyIdentityConfig, RequestContext};

const CONFIG: &str = r#"
enable = true
set_hostname = true
set_scheme = true
set_port = true
forbid_if_peer_not_trusted = true
trusted_networks = ["10.0.0.0/8", "fd00::/8"]
"#;

fn describe(req: &mut RequestContext) -> String {
    format!(
        "{}://{}:{} from {}",
        req.scheme,
        req.hostname.as_deref().unwrap_or("-"),
        req.port,
        req.remote_addr()
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = ProxyIdentityConfig::from_toml_str(CONFIG)?;
    let gate = IdentityGate::from_config(&config)?;

    println!("=== Connection from load balancer 10.0.0.1 ===");
    let connection = Connection::new("10.0.0.1".parse()?);

    // Step 1: forwarded request
    let mut adapter = RequestAdapter::new("req-1");
    adapter.add_header("Host", "app.internal");
    adapter.add_header("X-Forwarded-For", "203.0.113.5, 10.0.0.7");
    adapter.add_header("X-Forwarded-Host", "www.example.org");
    adapter.add_header("X-Forwarded-Proto", "https");
    adapter.add_header("X-Forwarded-Port", "443");
    let mut request = adapter.into_context(connection);

    let seen = process(&gate, &mut request, describe)?;
    println!("1. handler saw   {seen}");
    println!("   proxy chain   {:?}", request.notes.get("proxy-chain"));
    println!("   after request {}", describe(&mut request));

    // Step 2: plain request on the reused connection
    let mut adapter = RequestAdapter::new("req-2");
    adapter.add_header("Host", "app.internal");
    let mut request = adapter.into_context(request.into_connection());

    let seen = process(&gate, &mut request, describe)?;
    println!("2. handler saw   {seen}");

    // Step 3: handler panics mid-request
    let mut adapter = RequestAdapter::new("req-3");
    adapter.add_header("Host", "app.internal");
    adapter.add_header("X-Forwarded-For", "198.51.100.42");
    let mut request = adapter.into_context(request.into_connection());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        process(&gate, &mut request, |req| {
            panic!("handler crashed while serving {}", req.remote_addr())
        })
    }));
    println!("3. handler panicked: {}", outcome.is_err());
    println!("   after request {}", describe(&mut request));

    println!("\n=== Direct connection from 192.0.2.9 ===");
    let mut adapter = RequestAdapter::new("req-4");
    adapter.add_header("X-Forwarded-For", "127.0.0.1");
    let mut request = adapter.into_context(Connection::new("192.0.2.9".parse()?));

    match process(&gate, &mut request, describe) {
        Ok(seen) => println!("4. handler saw   {seen}"),
        Err(forbidden) => println!("4. rejected: {forbidden}"),
    }

    Ok(())
}
