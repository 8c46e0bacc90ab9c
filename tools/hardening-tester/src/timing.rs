use std::fmt;
use std::time::Duration;

/// Where an observed elapsed time falls relative to an expected bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingClass {
    Early,
    Within,
    Late,
}

/// An expected duration with symmetric slack.  Network and scheduler jitter make exact
/// comparisons meaningless from outside the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingWindow {
    pub expected: Duration,
    pub slack: Duration,
}

impl TimingWindow {
    pub fn new(expected: Duration, slack: Duration) -> TimingWindow {
        TimingWindow { expected, slack }
    }

    pub fn earliest(&self) -> Duration {
        self.expected.checked_sub(self.slack).unwrap_or_default()
    }

    pub fn latest(&self) -> Duration {
        self.expected + self.slack
    }

    pub fn classify(&self, elapsed: Duration) -> TimingClass {
        if elapsed < self.earliest() {
            TimingClass::Early
        } else if elapsed > self.latest() {
            TimingClass::Late
        } else {
            TimingClass::Within
        }
    }
}

impl fmt::Display for TimingWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:.1}s ± {:.1}s",
            self.expected.as_secs_f64(),
            self.slack.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> TimingWindow {
        TimingWindow::new(Duration::from_secs(15), Duration::from_secs(2))
    }

    #[test]
    fn elapsed_inside_slack_is_within() {
        assert_eq!(window().classify(Duration::from_secs(13)), TimingClass::Within);
        assert_eq!(window().classify(Duration::from_secs(15)), TimingClass::Within);
        assert_eq!(window().classify(Duration::from_secs(17)), TimingClass::Within);
    }

    #[test]
    fn elapsed_before_slack_is_early() {
        assert_eq!(window().classify(Duration::from_millis(12_999)), TimingClass::Early);
        assert_eq!(window().classify(Duration::from_secs(0)), TimingClass::Early);
    }

    #[test]
    fn elapsed_after_slack_is_late() {
        assert_eq!(window().classify(Duration::from_millis(17_001)), TimingClass::Late);
    }

    #[test]
    fn slack_larger_than_expected_never_underflows() {
        let window = TimingWindow::new(Duration::from_secs(1), Duration::from_secs(5));

        assert_eq!(window.earliest(), Duration::from_secs(0));
        assert_eq!(window.classify(Duration::from_secs(0)), TimingClass::Within);
    }

    #[test]
    fn display_shows_seconds() {
        assert_eq!(window().to_string(), "15.0s ± 2.0s");
    }
}
