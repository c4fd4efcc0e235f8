// One relay per test binary, shared by every test in it.
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

static RELAY_URL: OnceLock<String> = OnceLock::new();
static RELAY_READY: OnceLock<()> = OnceLock::new();

/// Starts the relay on an ephemeral port (once) and returns its WebSocket URL.
pub fn ensure_relay() -> &'static str {
    RELAY_READY.get_or_init(|| {
        let published = Arc::new(OnceLock::<String>::new());
        let published_thread = Arc::clone(&published);

        // Own thread and runtime so the relay outlives each #[tokio::test] runtime
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("relay runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral port");
                let addr = listener.local_addr().expect("local addr");
                let _ = published_thread.set(addr.to_string());
                skirmish::relay::run(listener, "http://localhost:5173")
                    .await
                    .expect("relay failed");
            });
        });

        wait_until_accepting(published);
    });

    RELAY_URL.get().expect("relay url initialized").as_str()
}

fn wait_until_accepting(published: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = RELAY_URL.set(format!("ws://{addr}/ws"));

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("relay at {addr} never accepted connections");
}
