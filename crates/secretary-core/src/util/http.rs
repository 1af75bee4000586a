use reqwest::Client;
use std::time::Duration;

/// Build an HTTP client with connection pooling and keep-alive.
///
/// Each service handle owns one of these for the life of the process.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(50)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(concat!("line-secretary/", env!("CARGO_PKG_VERSION")))
        .build()
}
