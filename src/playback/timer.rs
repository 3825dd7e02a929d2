use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

use crate::playback::Player;
use crate::settings::Settings;

/// Wall-clock driver for a continuous [`Player`]
pub struct TickTimer {
    interval: Interval,
}

impl TickTimer {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(Duration::from_millis(settings.refresh_interval_ms))
    }

    /// Wait for the next tick and apply it. Returns whether time moved.
    pub async fn tick(&mut self, player: &mut Player) -> bool {
        self.interval.tick().await;
        player.tick()
    }

    /// Tick until `stop` says so or the player is cleaned up
    pub async fn run_until<F>(&mut self, player: &mut Player, mut stop: F)
    where
        F: FnMut(&Player) -> bool,
    {
        while player.timer_armed() && !stop(player) {
            self.tick(player).await;
        }
        debug!(time = %player.current_time(), "timer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Timestamp;
    use crate::overlay::{OverlayRegistry, Surface};
    use serde_json::json;

    fn player(increment: f64) -> Player {
        let settings = Settings {
            tick_increment: increment,
            ..Settings::default()
        };
        let mut player = Player::continuous(Surface::new("test"), OverlayRegistry::new(), &settings);
        player
            .push_entity_data("A", &[json!([0, "0,0"]), json!([10, "1,1"])], None, None, None)
            .unwrap();
        player
    }

    #[tokio::test]
    async fn test_paused_player_does_not_advance() {
        let mut player = player(1.0);
        let mut timer = TickTimer::new(Duration::from_millis(1));

        assert!(!timer.tick(&mut player).await);
        assert!(!timer.tick(&mut player).await);
        assert_eq!(player.current_time(), Timestamp(0.0));
    }

    #[tokio::test]
    async fn test_run_until_past_stop() {
        let mut player = player(4.0);
        player.play().unwrap();
        let mut timer = TickTimer::new(Duration::from_millis(1));

        timer
            .run_until(&mut player, |p| {
                p.stop_time().is_some_and(|stop| p.current_time() > stop)
            })
            .await;
        assert_eq!(player.current_time(), Timestamp(12.0));
    }

    #[tokio::test]
    async fn test_clean_up_stops_timer() {
        let mut player = player(1.0);
        player.play().unwrap();
        player.clean_up();

        let mut timer = TickTimer::new(Duration::ZERO);
        let mut checks = 0;
        timer
            .run_until(&mut player, |_| {
                checks += 1;
                false
            })
            .await;
        assert_eq!(checks, 0);
    }
}
