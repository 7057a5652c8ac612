use std::time::Duration;

use crate::config::Config;

/// Liveness of a cast connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// Data arrived within the last wait window.
    AwaitingData,
    /// A wait window elapsed in silence, a ping went out and the device has
    /// not answered yet.
    PingSentAwaitingPong,
    /// The device stayed silent through every pong window. Terminal.
    Dead,
}

/// What the caller should do after a wait window elapsed with no data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timeout {
    /// Send a heartbeat `PING` and keep waiting.
    SendPing,
    /// Keep waiting for the pong.
    Wait,
    /// Tear down the connection.
    Dead,
}

/// Ping/pong liveness tracking. Drives the timeout of each wait cycle.
#[derive(Clone, Debug)]
pub struct Keepalive {
    ping_interval: Duration,
    pong_timeout: Duration,
    ping_retries: u32,
    timeout: Duration,
    retries: u32,
    ping_timeout: bool,
    dead: bool,
}

impl Keepalive {
    pub fn new(config: &Config) -> Self {
        Self {
            ping_interval: config.ping_interval,
            pong_timeout: config.pong_timeout,
            ping_retries: config.ping_retries,
            timeout: config.ping_interval,
            retries: config.ping_retries,
            ping_timeout: false,
            dead: false,
        }
    }

    pub fn state(&self) -> State {
        if self.dead {
            State::Dead
        } else if self.ping_timeout {
            State::PingSentAwaitingPong
        } else {
            State::AwaitingData
        }
    }

    /// Bound for the next wait cycle.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Any data from the device proves the connection is alive.
    pub fn on_data(&mut self) {
        if self.dead {
            return;
        }
        if self.ping_timeout {
            debug!("device answered, connection is alive");
        }
        self.timeout = self.ping_interval;
        self.retries = self.ping_retries;
        self.ping_timeout = false;
    }

    /// A wait cycle elapsed without data.
    pub fn on_timeout(&mut self) -> Timeout {
        if self.dead {
            return Timeout::Dead;
        }
        if !self.ping_timeout {
            debug!(
                "no data for {:?}, pinging device",
                self.ping_interval
            );
            self.ping_timeout = true;
            self.timeout = self.pong_timeout;
            self.retries = self.ping_retries;
            return Timeout::SendPing;
        }
        if self.retries == 0 {
            error!("device did not answer ping, connection is dead");
            self.dead = true;
            return Timeout::Dead;
        }
        self.retries -= 1;
        warn!(
            "ping timeout, {} retries left",
            self.retries
        );
        Timeout::Wait
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(retries: u32) -> Config {
        Config {
            ping_interval: Duration::from_millis(500),
            pong_timeout: Duration::from_millis(100),
            ping_retries: retries,
            ..Config::default()
        }
    }

    #[test]
    fn starts_awaiting_data() {
        let keepalive = Keepalive::new(&config(2));
        assert_eq!(State::AwaitingData, keepalive.state());
        assert_eq!(Duration::from_millis(500), keepalive.timeout());
        assert_eq!(2, keepalive.retries());
    }

    #[test]
    fn first_timeout_sends_ping_and_shortens_wait() {
        let mut keepalive = Keepalive::new(&config(2));
        assert_eq!(Timeout::SendPing, keepalive.on_timeout());
        assert_eq!(State::PingSentAwaitingPong, keepalive.state());
        assert_eq!(Duration::from_millis(100), keepalive.timeout());
    }

    #[test]
    fn dead_exactly_at_last_window() {
        for retries in 0..5 {
            let mut keepalive = Keepalive::new(&config(retries));
            // the ping window, one window per retry, then the fatal window
            let windows = retries + 2;
            let mut dead = 0;
            for window in 1..=windows {
                let timeout = keepalive.on_timeout();
                match window {
                    1 => assert_eq!(Timeout::SendPing, timeout),
                    w if w == windows => assert_eq!(Timeout::Dead, timeout),
                    _ => assert_eq!(Timeout::Wait, timeout),
                }
                if timeout == Timeout::Dead {
                    dead += 1;
                }
            }
            assert_eq!(1, dead);
            assert_eq!(State::Dead, keepalive.state());
        }
    }

    #[test]
    fn every_retry_gets_a_full_window() {
        let mut keepalive = Keepalive::new(&config(2));
        assert_eq!(Timeout::SendPing, keepalive.on_timeout());
        let windows = (0..3).map(|_| keepalive.on_timeout()).collect::<Vec<_>>();
        assert_eq!(vec![Timeout::Wait, Timeout::Wait, Timeout::Dead], windows);
    }

    #[test]
    fn data_resets_to_defaults() {
        let mut keepalive = Keepalive::new(&config(3));
        keepalive.on_timeout();
        keepalive.on_timeout();
        assert_eq!(2, keepalive.retries());
        keepalive.on_data();
        assert_eq!(State::AwaitingData, keepalive.state());
        assert_eq!(Duration::from_millis(500), keepalive.timeout());
        assert_eq!(3, keepalive.retries());
        // the next silence starts the ping cycle over
        assert_eq!(Timeout::SendPing, keepalive.on_timeout());
    }

    #[test]
    fn dead_is_terminal() {
        let mut keepalive = Keepalive::new(&config(1));
        assert_eq!(Timeout::SendPing, keepalive.on_timeout());
        assert_eq!(Timeout::Wait, keepalive.on_timeout());
        assert_eq!(Timeout::Dead, keepalive.on_timeout());
        keepalive.on_data();
        assert!(keepalive.is_dead());
        assert_eq!(Timeout::Dead, keepalive.on_timeout());
    }
}
