use super::error::{PipelineError, PipelineResult};
use super::types::Chunk;

/// Splits a media duration into time-aligned chunks of `chunk_size` seconds.
///
/// Whole chunks cover `floor(duration / chunk_size) * chunk_size` seconds;
/// any remainder becomes a single shorter tail chunk. The tail is never
/// zero-length, and a duration at or below one chunk yields exactly one
/// chunk of the full duration.
pub fn plan_chunks(duration: f64, chunk_size: u32) -> PipelineResult<Vec<Chunk>> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(PipelineError::Internal(format!(
            "cannot plan chunks for duration {duration}"
        )));
    }
    if chunk_size == 0 {
        return Err(PipelineError::Internal(
            "chunk size must be greater than zero".into(),
        ));
    }

    let size = f64::from(chunk_size);
    let num_whole = (duration / size).floor() as u32;
    let remainder = duration - f64::from(num_whole) * size;

    let mut chunks = Vec::with_capacity(num_whole as usize + 1);
    for i in 0..num_whole {
        chunks.push(Chunk {
            index: i + 1,
            start_seconds: f64::from(i) * size,
            duration_seconds: size,
        });
    }
    if remainder > 0.0 {
        chunks.push(Chunk {
            index: num_whole + 1,
            start_seconds: f64::from(num_whole) * size,
            duration_seconds: remainder,
        });
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(chunks: &[Chunk]) {
        assert_eq!(chunks[0].start_seconds, 0.0);
        for pair in chunks.windows(2) {
            assert_eq!(
                pair[1].start_seconds,
                pair[0].start_seconds + pair[0].duration_seconds
            );
        }
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as u32 + 1);
            assert!(chunk.duration_seconds > 0.0);
        }
    }

    #[test]
    fn splits_with_tail() {
        let chunks = plan_chunks(25.0, 10).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].duration_seconds, 10.0);
        assert_eq!(chunks[1].duration_seconds, 10.0);
        assert_eq!(chunks[2].duration_seconds, 5.0);
        assert_eq!(chunks[2].start_seconds, 20.0);
        assert_contiguous(&chunks);
    }

    #[test]
    fn exact_division_has_no_tail() {
        let chunks = plan_chunks(30.0, 10).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.duration_seconds == 10.0));
        assert_contiguous(&chunks);
    }

    #[test]
    fn short_source_yields_single_chunk() {
        let chunks = plan_chunks(4.0, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_seconds, 0.0);
        assert_eq!(chunks[0].duration_seconds, 4.0);
    }

    #[test]
    fn sub_second_source_yields_single_chunk() {
        let chunks = plan_chunks(0.4, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].duration_seconds, 0.4);
    }

    #[test]
    fn fractional_tail_is_kept() {
        let chunks = plan_chunks(10.5, 10).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start_seconds, 10.0);
        assert!((chunks[1].duration_seconds - 0.5).abs() < 1e-9);
        assert_contiguous(&chunks);
    }

    #[test]
    fn durations_cover_the_source() {
        for duration in [0.7, 9.99, 10.0, 25.0, 59.3, 600.0] {
            let chunks = plan_chunks(duration, 10).unwrap();
            let total: f64 = chunks.iter().map(|c| c.duration_seconds).sum();
            assert!((total - duration).abs() < 1e-9, "duration {duration}");
            assert_contiguous(&chunks);
        }
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(plan_chunks(0.0, 10).is_err());
        assert!(plan_chunks(-3.0, 10).is_err());
        assert!(plan_chunks(10.0, 0).is_err());
        assert!(plan_chunks(f64::NAN, 10).is_err());
    }
}
