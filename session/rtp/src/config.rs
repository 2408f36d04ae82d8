use std::{net::SocketAddr, time::Duration};

use crate::errors::{RtpSessionError, RtpSessionResult};

/// Identity and bind points of the local end of the session. The SDES
/// fields are optional; a CNAME is synthesized at emission time when absent.
#[derive(Debug, Clone)]
pub struct LocalParticipant {
    pub data_address: SocketAddr,
    pub control_address: SocketAddr,
    pub cname: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub tool: Option<String>,
    pub note: Option<String>,
}

impl LocalParticipant {
    pub fn new(data_address: SocketAddr, control_address: SocketAddr) -> Self {
        Self {
            data_address,
            control_address,
            cname: None,
            name: None,
            email: None,
            phone: None,
            location: None,
            tool: None,
            note: None,
        }
    }
}

/// Immutable session parameters. Built once before `init`; the session
/// keeps its own copy, so nothing can be reconfigured while it is running.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub id: String,
    pub payload_type: u8,
    pub local: LocalParticipant,
    pub discard_out_of_order: bool,
    /// Session bandwidth budget in octets per second, reserved for an
    /// adaptive RTCP interval strategy.
    pub bandwidth_limit: u64,
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub max_collisions_before_loop: u32,
    pub automated_rtcp_handling: bool,
    pub try_to_update_on_every_sdes: bool,
    pub periodic_rtcp_interval: Duration,
    pub participant_idle_timeout: Duration,
}

impl SessionConfig {
    pub fn builder(id: String, payload_type: u8, local: LocalParticipant) -> SessionConfigBuilder {
        SessionConfigBuilder(SessionConfig {
            id,
            payload_type,
            local,
            discard_out_of_order: true,
            bandwidth_limit: 256_000,
            send_buffer_size: 1000,
            receive_buffer_size: 1000,
            max_collisions_before_loop: 3,
            automated_rtcp_handling: true,
            try_to_update_on_every_sdes: false,
            periodic_rtcp_interval: Duration::from_secs(5),
            participant_idle_timeout: Duration::from_secs(60),
        })
    }
}

#[derive(Debug)]
pub struct SessionConfigBuilder(SessionConfig);

impl SessionConfigBuilder {
    pub fn discard_out_of_order(mut self, discard: bool) -> Self {
        self.0.discard_out_of_order = discard;
        self
    }

    pub fn bandwidth_limit(mut self, limit: u64) -> Self {
        self.0.bandwidth_limit = limit;
        self
    }

    pub fn send_buffer_size(mut self, size: usize) -> Self {
        self.0.send_buffer_size = size;
        self
    }

    pub fn receive_buffer_size(mut self, size: usize) -> Self {
        self.0.receive_buffer_size = size;
        self
    }

    pub fn max_collisions_before_loop(mut self, max: u32) -> Self {
        self.0.max_collisions_before_loop = max;
        self
    }

    pub fn automated_rtcp_handling(mut self, automated: bool) -> Self {
        self.0.automated_rtcp_handling = automated;
        self
    }

    pub fn try_to_update_on_every_sdes(mut self, always: bool) -> Self {
        self.0.try_to_update_on_every_sdes = always;
        self
    }

    pub fn periodic_rtcp_interval(mut self, interval: Duration) -> Self {
        self.0.periodic_rtcp_interval = interval;
        self
    }

    pub fn participant_idle_timeout(mut self, timeout: Duration) -> Self {
        self.0.participant_idle_timeout = timeout;
        self
    }

    pub fn build(self) -> RtpSessionResult<SessionConfig> {
        if self.0.payload_type > 127 {
            return Err(RtpSessionError::InvalidConfiguration(format!(
                "payload type must be in [0, 127], got {}",
                self.0.payload_type
            )));
        }
        if self.0.local.data_address == self.0.local.control_address {
            return Err(RtpSessionError::InvalidConfiguration(format!(
                "data and control channels cannot share address {}",
                self.0.local.data_address
            )));
        }
        if self.0.periodic_rtcp_interval.is_zero() {
            return Err(RtpSessionError::InvalidConfiguration(
                "periodic RTCP interval cannot be zero".to_string(),
            ));
        }
        Ok(self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn local() -> LocalParticipant {
        LocalParticipant::new(
            "127.0.0.1:5000".parse().unwrap(),
            "127.0.0.1:5001".parse().unwrap(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::builder("s1".to_string(), 96, local())
            .build()
            .unwrap();
        assert!(config.discard_out_of_order);
        assert!(config.automated_rtcp_handling);
        assert!(!config.try_to_update_on_every_sdes);
        assert_eq!(config.max_collisions_before_loop, 3);
        assert_eq!(config.periodic_rtcp_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_payload_type_range_is_checked() {
        let result = SessionConfig::builder("s1".to_string(), 128, local()).build();
        assert!(matches!(
            result,
            Err(RtpSessionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_shared_channel_address_is_rejected() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let result =
            SessionConfig::builder("s1".to_string(), 0, LocalParticipant::new(addr, addr)).build();
        assert!(matches!(
            result,
            Err(RtpSessionError::InvalidConfiguration(_))
        ));
    }
}
