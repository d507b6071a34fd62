use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tokio::io::{AsyncBufRead, BufReader};

use fall_detection::models::{Envelope, LabeledSample, LandmarkFrame, PosePayload, Topic};
use fall_detection::InvalidFrameError;

/// Buffered reader over a file, or stdin when no path is given
pub async fn open_reader(path: Option<&Path>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    Ok(match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    })
}

/// Parse one pose line: a bare payload object or a `PoseData` envelope
pub fn parse_pose_line(line: &str) -> Result<LandmarkFrame, InvalidFrameError> {
    let trimmed = line.trim();
    let payload = if trimmed.starts_with('{') {
        PosePayload::from_json(trimmed)?
    } else {
        let json = trimmed
            .strip_prefix(Topic::PoseData.as_str())
            .unwrap_or(trimmed)
            .trim_start();
        PosePayload::from_json(json)?
    };
    LandmarkFrame::try_from(payload)
}

/// Read a table of pose rows, keeping each row's ingestion outcome
pub fn read_pose_table(path: &Path) -> Result<Vec<Result<LandmarkFrame, InvalidFrameError>>> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_pose_line)
        .collect())
}

/// Read feature records (optionally labeled) from JSON lines.
///
/// Accepts `FeatureData` envelopes and the rows written by the `features`
/// command; rows flagged `skipped` carry no measurement and are dropped.
pub fn read_samples(path: &Path) -> Result<Vec<LabeledSample>> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut samples = Vec::new();

    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = if line.starts_with('{') {
            serde_json::from_str(line).with_context(|| format!("Line {}: invalid JSON", number + 1))?
        } else {
            let envelope = Envelope::parse_line(line).with_context(|| format!("Line {}", number + 1))?;
            if envelope.topic != Topic::FeatureData {
                continue;
            }
            envelope.payload
        };

        if value.get("skipped").and_then(Value::as_bool).unwrap_or(false) {
            continue;
        }

        let sample: LabeledSample =
            serde_json::from_value(value).with_context(|| format!("Line {}: not a feature record", number + 1))?;
        samples.push(sample);
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fall_detection::models::MovementState;
    use std::io::Write;

    const POSE: &str = r#"{"Image_Timestamp":"2024-05-01 10:00:00.000000","Pose_Timestamp":"2024-05-01 10:00:00.010000","MAX_Width":640,"MAX_Height":480,"Landmarks":[]}"#;

    #[test]
    fn test_parse_pose_line_variants() {
        assert!(matches!(parse_pose_line(POSE), Err(InvalidFrameError::NoPoseDetected)));
        assert!(matches!(
            parse_pose_line(&format!("PoseData {}", POSE)),
            Err(InvalidFrameError::NoPoseDetected)
        ));
        assert!(matches!(parse_pose_line("{not json"), Err(InvalidFrameError::MalformedPayload(_))));
    }

    #[test]
    fn test_read_samples_mixed_sources() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"Feature_Timestamp":"2024-05-01 10:00:00.1","Frame_Rate":10.0,"CoG_Angle":5.0,"Movement_Rate":1.0,"Label":"Fallen"}}"#
        )
        .unwrap();
        writeln!(
            file,
            r#"FeatureData {{"Feature_Timestamp":"2024-05-01 10:00:00.2","Frame_Rate":10.0,"CoG_Angle":80.0,"Movement_Rate":30.0}}"#
        )
        .unwrap();
        writeln!(
            file,
            r#"{{"source_index":3,"Feature_Timestamp":"2024-05-01 10:00:00.3","Frame_Rate":0.0,"CoG_Angle":0.0,"Movement_Rate":0.0,"jitter":0.001,"skipped":true}}"#
        )
        .unwrap();
        writeln!(file, r#"FallAlert {{"state":"Fallen"}}"#).unwrap();

        let samples = read_samples(file.path()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].state, Some(MovementState::Fallen));
        assert_eq!(samples[1].state, None);
        assert_eq!(samples[1].features.cog_angle, 80.0);
    }
}
