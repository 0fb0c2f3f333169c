use futures_util::future::join_all;
use rand::{SeedableRng, rngs::StdRng};
use reqwest::{Client, header::USER_AGENT};
use tokio::time::{Duration, sleep};
use tracing::{debug, info};
use tryhard::{RetryFutureConfig, retry_fn};

use crate::generator::generate_request;

const MAX_RATE_BEFORE_DISABLING_THROTTLING: u64 = 10_000;

/// Waits for `<target>/up` with exponential back-off.
pub async fn wait_for_target(client: &Client, target: &str) -> Result<(), reqwest::Error> {
    let config = RetryFutureConfig::new(10)
        .exponential_backoff(Duration::from_millis(100))
        .max_delay(Duration::from_secs(5));
    retry_fn(|| async {
        info!(host = target, "Waiting for host");
        client.get(format!("{target}/up")).send().await?.error_for_status()
    })
    .with_config(config)
    .await?;
    Ok(())
}

/// Sends batches of generated requests until `max_batches` (or forever).
pub async fn run_traffic(
    client: Client,
    target: String,
    rate: u64,
    batch_size: usize,
    max_batches: Option<usize>,
) -> Result<usize, reqwest::Error> {
    wait_for_target(&client, &target).await?;

    let mut rng = StdRng::from_os_rng();
    let delay = if rate < MAX_RATE_BEFORE_DISABLING_THROTTLING {
        Some(Duration::from_secs_f64(
            batch_size as f64 / rate.max(1) as f64,
        ))
    } else {
        None
    };

    let mut sent = 0;
    let mut batches = 0;
    while max_batches.is_none_or(|max| batches < max) {
        let requests = (0..batch_size).map(|_| {
            let planned = generate_request(&mut rng);
            client
                .request(planned.method, format!("{target}{}", planned.path))
                .header(USER_AGENT, planned.user_agent)
                .send()
        });
        for result in join_all(requests.collect::<Vec<_>>()).await {
            match result {
                Ok(response) => {
                    debug!(status = %response.status(), url = %response.url(), "Sent");
                    sent += 1;
                }
                Err(e) => debug!(error = %e, "Request failed"),
            }
        }
        batches += 1;

        if let Some(d) = delay {
            sleep(d).await;
        }
    }
    Ok(sent)
}
