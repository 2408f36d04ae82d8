use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 64-bit NTP timestamp as carried in sender reports: seconds since
/// 1900-01-01 in the high word, 2^-32 fractions in the low word.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NtpTimestamp {
    pub seconds: u32,
    pub fraction: u32,
}

/// Seconds between the NTP era (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

impl From<u64> for NtpTimestamp {
    fn from(value: u64) -> Self {
        Self {
            seconds: (value >> 32) as u32,
            fraction: (value & 0xFFFF_FFFF) as u32,
        }
    }
}

impl From<NtpTimestamp> for u64 {
    fn from(value: NtpTimestamp) -> Self {
        ((value.seconds as u64) << 32) | (value.fraction as u64)
    }
}

impl From<SystemTime> for NtpTimestamp {
    fn from(value: SystemTime) -> Self {
        let since_epoch = value
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self {
            seconds: (since_epoch.as_secs() + NTP_UNIX_OFFSET) as u32,
            fraction: (((since_epoch.subsec_nanos() as u64) << 32) / 1_000_000_000) as u32,
        }
    }
}

/// Middle 32 bits of an [`NtpTimestamp`], the LSR/DLSR wire form.
pub fn short_ntp(timestamp: NtpTimestamp) -> u32 {
    ((timestamp.seconds & 0xFFFF) << 16) | (timestamp.fraction >> 16)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ntp_split_and_join() {
        let ntp = NtpTimestamp::from(0x0123_4567_89AB_CDEF_u64);
        assert_eq!(ntp.seconds, 0x0123_4567);
        assert_eq!(ntp.fraction, 0x89AB_CDEF);
        assert_eq!(u64::from(ntp), 0x0123_4567_89AB_CDEF);
        assert_eq!(short_ntp(ntp), 0x4567_89AB);
    }
}
