use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{open_session, ScenarioContext, Verdict};
use crate::errors::ProbeError;
use crate::timing::{TimingClass, TimingWindow};
use crate::transport::Connection;

/// How long past the server's timeout we keep waiting before calling it not enforced
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Pause between liveness probes while waiting
const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// How a disconnect after `publish` lines up with the server's two idle timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostPublishClose {
    /// Around the video/audio data timeout, the behavior under test
    DataTimeout,

    /// Around the shorter publish timeout, which usually means the server refused the publish
    /// (for example because the stream path is not configured) and timed the connection out
    /// as never having published
    PublishTimeout,

    Early,
}

pub fn classify_post_publish_close(
    elapsed: Duration,
    video_data: TimingWindow,
    publish: TimingWindow,
) -> PostPublishClose {
    if video_data.classify(elapsed) != TimingClass::Early {
        PostPublishClose::DataTimeout
    } else if publish.classify(elapsed) != TimingClass::Early {
        PostPublishClose::PublishTimeout
    } else {
        PostPublishClose::Early
    }
}

/// Probes until the peer closes or `limit` passes.  Returns the elapsed time of the close.
fn wait_for_disconnect(connection: &mut Connection, limit: Duration) -> Option<Duration> {
    let started = Instant::now();
    while started.elapsed() < limit {
        if !connection.is_alive() {
            return Some(started.elapsed());
        }

        thread::sleep(PROBE_INTERVAL);
    }

    None
}

/// Connects but never publishes
pub fn publish_timeout(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let client = context.client;
    let config = context.config;
    let window = TimingWindow::new(config.limits.publish_timeout(), config.timing.timing_slack());

    let mut connection = open_session(context)?;

    if let Err(error) = client.send_connect(&mut connection, &config.publish.app_name) {
        return Ok(Verdict::fail(format!("Disconnected during connect: {}", error)));
    }

    let limit = window.expected + DISCONNECT_GRACE;
    debug!(?limit, "waiting for publish timeout");
    let closed_after = wait_for_disconnect(&mut connection, limit);
    connection.close();

    let verdict = match closed_after {
        Some(elapsed) => Verdict::pass(format!(
            "Server disconnected after ~{:.1}s (publish timeout {}, {:?})",
            elapsed.as_secs_f64(),
            window,
            window.classify(elapsed),
        )),

        None => Verdict::fail(format!(
            "Server did NOT disconnect within {:.1}s",
            limit.as_secs_f64()
        )),
    };

    Ok(verdict)
}

/// Publishes and then never sends media
pub fn video_data_timeout(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let client = context.client;
    let config = context.config;
    let slack = config.timing.timing_slack();
    let video_window = TimingWindow::new(config.limits.video_data_timeout(), slack);
    let publish_window = TimingWindow::new(config.limits.publish_timeout(), slack);

    let mut connection = open_session(context)?;

    if let Err(error) = client.run_publish_sequence(
        &mut connection,
        &config.publish.app_name,
        &config.publish.stream_name,
    ) {
        return Ok(Verdict::fail(format!(
            "Disconnected during the publish sequence: {}",
            error
        )));
    }

    let limit = video_window.expected + DISCONNECT_GRACE;
    debug!(?limit, "waiting for video data timeout");
    let closed_after = wait_for_disconnect(&mut connection, limit);
    connection.close();

    let elapsed = match closed_after {
        Some(elapsed) => elapsed,
        None => {
            return Ok(Verdict::fail(format!(
                "Server did NOT disconnect within {:.1}s",
                limit.as_secs_f64()
            )))
        }
    };

    let seconds = elapsed.as_secs_f64();
    let detail = match classify_post_publish_close(elapsed, video_window, publish_window) {
        PostPublishClose::DataTimeout => format!(
            "Disconnected after ~{:.1}s (video data timeout {})",
            seconds, video_window
        ),

        PostPublishClose::PublishTimeout => format!(
            "WARN: Disconnected after ~{:.1}s, near the publish timeout {}; the publish was \
             likely rejected, configure the stream path on the server to test the data timeout",
            seconds, publish_window
        ),

        PostPublishClose::Early => format!("Disconnected after ~{:.1}s", seconds),
    };

    Ok(Verdict::pass(detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProtocolClient;
    use crate::test_support::{fast_config, MockBehavior, MockServer};

    fn windows() -> (TimingWindow, TimingWindow) {
        let slack = Duration::from_secs(2);
        (
            TimingWindow::new(Duration::from_secs(15), slack),
            TimingWindow::new(Duration::from_secs(10), slack),
        )
    }

    #[test]
    fn close_near_video_timeout_is_data_timeout() {
        let (video, publish) = windows();

        assert_eq!(
            classify_post_publish_close(Duration::from_secs(13), video, publish),
            PostPublishClose::DataTimeout
        );
        assert_eq!(
            classify_post_publish_close(Duration::from_secs(19), video, publish),
            PostPublishClose::DataTimeout
        );
    }

    #[test]
    fn close_near_publish_timeout_is_the_alternative() {
        let (video, publish) = windows();

        assert_eq!(
            classify_post_publish_close(Duration::from_secs(8), video, publish),
            PostPublishClose::PublishTimeout
        );
        assert_eq!(
            classify_post_publish_close(Duration::from_millis(12_500), video, publish),
            PostPublishClose::PublishTimeout
        );
    }

    #[test]
    fn close_before_both_windows_is_early() {
        let (video, publish) = windows();

        assert_eq!(
            classify_post_publish_close(Duration::from_secs(3), video, publish),
            PostPublishClose::Early
        );
    }

    #[test]
    fn publish_timeout_passes_against_idle_timeout_server() {
        let server = MockServer::start(MockBehavior::IdleTimeout {
            after: Duration::from_millis(400),
        });

        let config = fast_config(server.address());
        let client = ProtocolClient::new(server.address(), &config).unwrap();
        let context = ScenarioContext {
            client: &client,
            config: &config,
        };

        let verdict = publish_timeout(&context).unwrap();
        assert!(verdict.passed, "Unexpected failure: {}", verdict.detail);
    }

    #[test]
    fn video_data_timeout_passes_and_reports_classification() {
        let server = MockServer::start(MockBehavior::IdleTimeout {
            after: Duration::from_millis(900),
        });

        let config = fast_config(server.address());
        let client = ProtocolClient::new(server.address(), &config).unwrap();
        let context = ScenarioContext {
            client: &client,
            config: &config,
        };

        let verdict = video_data_timeout(&context).unwrap();
        assert!(verdict.passed, "Unexpected failure: {}", verdict.detail);
        assert!(verdict.detail.starts_with("Disconnected") || verdict.detail.starts_with("WARN"));
    }
}
