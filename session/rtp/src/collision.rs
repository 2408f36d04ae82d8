use std::{collections::HashSet, net::SocketAddr};

/// Outcome of checking an inbound data packet's SSRC against the local
/// identity, in the order RFC 3550 8.2 resolves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsrcVerdict {
    /// Not our SSRC; process normally.
    Normal,
    /// Our own packet came back from our own address: the session is
    /// looped and must terminate.
    SelfLoop,
    /// A third party picked our SSRC; rotate to `new_ssrc`.
    Collision { new_ssrc: u32 },
    /// Collisions keep happening, which means a loop through a mixer or
    /// translator; terminate.
    LoopByCollisions,
}

pub fn classify(
    packet_ssrc: u32,
    origin: SocketAddr,
    local_ssrc: u32,
    local_data_address: SocketAddr,
    collision_count: u32,
    max_collisions: u32,
    in_use: &HashSet<u32>,
) -> SsrcVerdict {
    if packet_ssrc != local_ssrc {
        return SsrcVerdict::Normal;
    }
    if origin == local_data_address {
        return SsrcVerdict::SelfLoop;
    }
    if collision_count + 1 > max_collisions {
        return SsrcVerdict::LoopByCollisions;
    }
    SsrcVerdict::Collision {
        new_ssrc: draw_ssrc(local_ssrc, in_use),
    }
}

/// Uniform draw from [1, 2^32), excluding `exclude` and everything already
/// in use in the session.
pub fn draw_ssrc(exclude: u32, in_use: &HashSet<u32>) -> u32 {
    loop {
        let candidate = rand::random::<u32>();
        if candidate != 0 && candidate != exclude && !in_use.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const LOCAL_SSRC: u32 = 0x1234_5678;

    fn local_address() -> SocketAddr {
        "192.168.1.10:5000".parse().unwrap()
    }

    fn remote_address() -> SocketAddr {
        "192.168.1.20:5000".parse().unwrap()
    }

    #[test]
    fn test_foreign_ssrc_is_normal() {
        let verdict = classify(
            0x9999_0000,
            remote_address(),
            LOCAL_SSRC,
            local_address(),
            0,
            3,
            &HashSet::new(),
        );
        assert_eq!(verdict, SsrcVerdict::Normal);
    }

    #[test]
    fn test_own_ssrc_from_own_address_is_a_self_loop() {
        let verdict = classify(
            LOCAL_SSRC,
            local_address(),
            LOCAL_SSRC,
            local_address(),
            0,
            3,
            &HashSet::new(),
        );
        assert_eq!(verdict, SsrcVerdict::SelfLoop);
    }

    #[test]
    fn test_own_ssrc_from_elsewhere_is_a_collision() {
        let verdict = classify(
            LOCAL_SSRC,
            remote_address(),
            LOCAL_SSRC,
            local_address(),
            0,
            3,
            &HashSet::new(),
        );
        match verdict {
            SsrcVerdict::Collision { new_ssrc } => {
                assert_ne!(new_ssrc, LOCAL_SSRC);
                assert_ne!(new_ssrc, 0);
            }
            other => panic!("expected collision, got {:?}", other),
        }
    }

    #[test]
    fn test_collision_budget_exhaustion_is_a_loop() {
        let verdict = classify(
            LOCAL_SSRC,
            remote_address(),
            LOCAL_SSRC,
            local_address(),
            3,
            3,
            &HashSet::new(),
        );
        assert_eq!(verdict, SsrcVerdict::LoopByCollisions);
    }

    #[test]
    fn test_draw_avoids_in_use_set() {
        let mut in_use = HashSet::new();
        for ssrc in 1..64_u32 {
            in_use.insert(ssrc);
        }
        for _ in 0..100 {
            let drawn = draw_ssrc(LOCAL_SSRC, &in_use);
            assert_ne!(drawn, 0);
            assert_ne!(drawn, LOCAL_SSRC);
            assert!(!in_use.contains(&drawn));
        }
    }
}
