//! Millisecond clock used to stamp instance ids and minimized records.

use std::cell::Cell;

thread_local! {
    static ID_CLOCK: Cell<u64> = const { Cell::new(0) };
}

/// Current unix time in milliseconds; zero if the host clock is before the epoch.
pub fn unix_time_ms_now() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now().max(0.0) as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|since| since.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// The stamp issued after `last` when the clock reads `now`.
///
/// A stalled or rewound clock yields `last + 1`.
pub const fn next_after(last: u64, now: u64) -> u64 {
    let bumped = last.saturating_add(1);
    if now > bumped {
        now
    } else {
        bumped
    }
}

/// Issues a per-thread, strictly increasing millisecond stamp.
pub fn next_monotonic_timestamp_ms() -> u64 {
    let now = unix_time_ms_now();
    ID_CLOCK.with(|clock| {
        let stamp = next_after(clock.get(), now);
        clock.set(stamp);
        stamp
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn next_after_follows_a_moving_clock() {
        assert_eq!(next_after(10, 25), 25);
    }

    #[test]
    fn next_after_bumps_past_a_stalled_or_rewound_clock() {
        assert_eq!(next_after(10, 10), 11);
        assert_eq!(next_after(10, 3), 11);
        assert_eq!(next_after(u64::MAX, 0), u64::MAX);
    }

    #[test]
    fn issued_stamps_never_repeat_on_one_thread() {
        let stamps: Vec<_> = (0..64).map(|_| next_monotonic_timestamp_ms()).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
