use core::time::Duration;

use dyntimer_core::options::TimerOptions;
use dyntimer_core::strategy::{Strategy, duration_millis, next_delay, series_value};

fn binet_fibonacci(n: u32) -> u64 {
    let root5 = 5f64.sqrt();
    let n = i32::try_from(n).expect("small index");
    ((((1.0 + root5).powi(n)) - ((1.0 - root5).powi(n))) / (2f64.powi(n) * root5)).round() as u64
}

fn binet_lucas(n: u32) -> u64 {
    let root5 = 5f64.sqrt();
    let n = i32::try_from(n).expect("small index");
    (((1.0 + root5) / 2.0).powi(n) + ((1.0 - root5) / 2.0).powi(n)).round() as u64
}

#[test]
fn exact_tables_agree_with_closed_forms_up_to_the_ceilings() {
    for n in 1..=Strategy::Fibonacci.default_max_attempts() {
        assert_eq!(series_value(Strategy::Fibonacci, n), binet_fibonacci(n), "F({n})");
    }
    for n in 1..=Strategy::Lucas.default_max_attempts() {
        assert_eq!(series_value(Strategy::Lucas, n), binet_lucas(n), "L({n})");
    }
}

#[test]
fn next_delay_matches_clamped_scaled_series() {
    let seed = 250;
    for strategy in Strategy::ALL {
        for max_delay in [None, Some(10_000u64)] {
            let mut builder = TimerOptions::builder()
                .strategy(strategy)
                .seed(Duration::from_millis(seed))
                .max_attempts(12);
            if let Some(cap) = max_delay {
                builder = builder.max_delay(Duration::from_millis(cap));
            }
            let options = builder.build();

            for n in 1..=20 {
                let expected = seed * series_value(strategy, n.min(12));
                let expected = max_delay.map_or(expected, |cap| expected.min(cap));
                assert_eq!(
                    duration_millis(next_delay(&options, n)),
                    expected,
                    "{strategy} n={n} cap={max_delay:?}"
                );
            }
        }
    }
}

#[test]
fn next_delay_never_decreases() {
    for strategy in Strategy::ALL {
        let options = TimerOptions::builder().strategy(strategy).build();
        let mut previous = Duration::ZERO;
        for n in 1..=options.max_attempts() + 10 {
            let delay = next_delay(&options, n);
            assert!(delay >= previous, "{strategy} decreased at n={n}");
            previous = delay;
        }
    }
}

#[test]
fn default_dayan_delays_follow_half_squares() {
    let options = TimerOptions::default();
    let delays: Vec<u64> = (1..=6)
        .map(|n| duration_millis(next_delay(&options, n)))
        .collect();
    assert_eq!(delays, [0, 2_000, 4_000, 8_000, 12_000, 18_000]);
}

#[test]
fn attempt_index_zero_is_treated_as_one() {
    let options = TimerOptions::builder().strategy(Strategy::Lucas).build();
    assert_eq!(next_delay(&options, 0), next_delay(&options, 1));
}

#[test]
fn huge_seeds_saturate_instead_of_overflowing() {
    let options = TimerOptions::builder()
        .strategy(Strategy::Procession)
        .seed(Duration::from_millis(u64::MAX / 2))
        .build();
    assert_eq!(next_delay(&options, options.max_attempts()), Duration::MAX);
}

#[test]
fn fractional_seeds_scale_without_truncation() {
    let options = TimerOptions::builder()
        .strategy(Strategy::Procession)
        .seed(Duration::from_micros(1_500))
        .max_delay(Duration::from_micros(9_250))
        .build();
    let delays: Vec<Duration> = (1..=4).map(|n| next_delay(&options, n)).collect();
    assert_eq!(
        delays,
        [
            Duration::from_micros(1_500),
            Duration::from_micros(4_500),
            Duration::from_micros(7_500),
            Duration::from_micros(9_250),
        ]
    );
}

#[test]
fn default_ceilings_are_preserved() {
    let ceilings: Vec<u32> = Strategy::ALL
        .iter()
        .map(|strategy| strategy.default_max_attempts())
        .collect();
    assert_eq!(ceilings, [5_000, 141, 20, 19]);
}
