use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Decoded picture counters and frame rates.
///
/// Rates are only computed once a full second has elapsed since the first
/// picture. The windowed rate is recomputed at most once per second.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    started: Option<Instant>,
    window_started: Option<Instant>,
    window_pictures: u64,
    /// Pictures decoded since the first one.
    pub pictures: u64,
    /// Seconds since the first picture.
    pub elapsed_secs: f64,
    /// Rate over the last completed window.
    pub fps: Option<f64>,
    pub fps_min: Option<f64>,
    pub fps_max: Option<f64>,
    /// Average rate since the first picture.
    pub fps_since_start: Option<f64>,
}

impl Statistics {
    /// Count one decoded picture at `now`.
    ///
    /// Returns true when the rates were refreshed.
    pub fn record_picture(&mut self, now: Instant) -> bool {
        self.pictures += 1;
        self.window_pictures += 1;

        let started = *self.started.get_or_insert(now);
        let elapsed = now.duration_since(started);
        self.elapsed_secs = elapsed.as_secs_f64();
        if elapsed < WINDOW {
            return false;
        }

        match self.window_started {
            None => {
                self.window_started = Some(now);
                self.window_pictures = 0;
                return false;
            }
            Some(window_started) => {
                let window = now.duration_since(window_started);
                if window > WINDOW {
                    let fps = self.window_pictures as f64 / window.as_secs_f64();
                    self.window_started = Some(now);
                    self.window_pictures = 0;
                    self.fps_min = Some(self.fps_min.map_or(fps, |min| min.min(fps)));
                    self.fps_max = Some(self.fps_max.map_or(fps, |max| max.max(fps)));
                    self.fps = Some(fps);
                }
            }
        }

        self.fps_since_start = Some(self.pictures as f64 / elapsed.as_secs_f64());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_no_rates_during_first_second() {
        let t0 = Instant::now();
        let mut stats = Statistics::default();
        assert!(!stats.record_picture(t0));
        assert!(!stats.record_picture(t0 + ms(500)));
        assert_eq!(stats.pictures, 2);
        assert_eq!(stats.elapsed_secs, 0.5);
        assert!(stats.fps.is_none());
        assert!(stats.fps_since_start.is_none());
    }

    #[test]
    fn test_window_rates() {
        let t0 = Instant::now();
        let mut stats = Statistics::default();
        // 10 pictures per second for 4 seconds.
        let mut updated = 0;
        for i in 0..=40u64 {
            if stats.record_picture(t0 + ms(i * 100)) {
                updated += 1;
            }
        }

        assert_eq!(stats.pictures, 41);
        assert!(updated > 0);
        let fps = stats.fps.unwrap();
        assert!((fps - 10.0).abs() < 1.5, "fps was {fps}");
        assert!(stats.fps_min.unwrap() <= fps);
        assert!(stats.fps_max.unwrap() >= fps);
        let avg = stats.fps_since_start.unwrap();
        assert!((avg - 10.25).abs() < 0.01, "avg was {avg}");
    }

    #[test]
    fn test_min_max_follow_rate_changes() {
        let t0 = Instant::now();
        let mut stats = Statistics::default();
        let mut t = ms(0);
        // Fast for two seconds, then slow.
        while t <= ms(2000) {
            stats.record_picture(t0 + t);
            t += ms(50);
        }
        while t <= ms(6000) {
            stats.record_picture(t0 + t);
            t += ms(250);
        }
        let (min, max) = (stats.fps_min.unwrap(), stats.fps_max.unwrap());
        assert!(min < 6.0, "min was {min}");
        assert!(max > 15.0, "max was {max}");
    }
}
