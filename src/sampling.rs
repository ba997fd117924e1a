//! Reservoir sampling over sequences of unknown length.

use rand::Rng;

use crate::error::Result;

/// Select one element uniformly at random from a fallible sequence in
/// a single pass with O(1) additional memory.
///
/// The `k`-th element seen replaces the current candidate with
/// probability `1/k`, so after `n` elements each has been kept with
/// probability exactly `1/n`. An empty sequence yields `Ok(None)`;
/// errors from the underlying iterator propagate immediately.
pub fn reservoir_sample<T, I, G>(iter: I, rng: &mut G) -> Result<Option<T>>
where
    I: Iterator<Item = Result<T>>,
    G: Rng,
{
    let mut chosen = None;
    let mut seen: u64 = 0;
    for item in iter {
        let item = item?;
        seen += 1;
        if rng.gen_range(0..seen) == 0 {
            chosen = Some(item);
        }
    }
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_sequence_yields_none() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = reservoir_sample(std::iter::empty::<Result<u32>>(), &mut rng).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn single_element_is_always_chosen() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = reservoir_sample([Ok(7u32)].into_iter(), &mut rng).unwrap();
        assert_eq!(result, Some(7));
    }

    #[test]
    fn errors_propagate() {
        let mut rng = StdRng::seed_from_u64(0);
        let items = vec![
            Ok(1u32),
            Err(crate::error::Error::corruption("broken chain")),
            Ok(2),
        ];
        assert!(reservoir_sample(items.into_iter(), &mut rng).is_err());
    }

    #[test]
    fn selection_is_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(1234);
        let mut hits = [0u32; 4];
        let draws = 100_000u32;
        for _ in 0..draws {
            let chosen = reservoir_sample((0..4u32).map(Ok), &mut rng)
                .unwrap()
                .unwrap();
            hits[chosen as usize] += 1;
        }
        let expected = draws / 4;
        for (value, &count) in hits.iter().enumerate() {
            let deviation = (i64::from(count) - i64::from(expected)).unsigned_abs();
            assert!(
                deviation < u64::from(expected) / 20,
                "value {value} drawn {count} times, expected ~{expected}"
            );
        }
    }
}
