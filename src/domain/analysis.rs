//! 解析結果のスキーマ
//!
//! 解析サービスが返すJSONを型付きレコードとして受け取る。
//! フィールドの欠落・型違いは serde が拒否し、その後に区間と採点の不変条件を検査する。
//! 中身の書き換えや再計算はしない。

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub jumps: Vec<Jump>,
    pub overall_summary: String,
    pub suggested_improvements: Vec<String>,
    pub movement_name: String,
    pub similar_pro_rider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Jump {
    pub jump_number: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub phases: Vec<Phase>,
    pub overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub start_time: f64,
    pub end_time: f64,
    pub phase_name: String,
    pub rider_analysis: String,
    pub horse_analysis: String,
    pub physics_note: String,
    pub score: f64,
}

pub const MIN_PHASE_SCORE: f64 = 1.0;
pub const MAX_PHASE_SCORE: f64 = 10.0;

/// スキーマ違反
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("payload does not match the analysis schema: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("jump {jump}: {message}")]
    Invariant { jump: u32, message: String },
}

impl AnalysisResult {
    /// テキストのペイロードを解析結果として読み取る
    ///
    /// ```json で囲まれていても中身だけを取り出す。部分的な結果は返さない。
    pub fn from_payload(text: &str) -> Result<Self, SchemaError> {
        let result: Self = serde_json::from_str(strip_code_fence(text))?;
        result.check_invariants()?;
        Ok(result)
    }

    /// 区間と採点の不変条件
    ///
    /// - すべての区間で start_time < end_time
    /// - ジャンプ内のフェーズは時刻順で重ならない
    /// - フェーズの score は [1, 10]
    pub fn check_invariants(&self) -> Result<(), SchemaError> {
        for jump in &self.jumps {
            let invariant = |message: String| SchemaError::Invariant {
                jump: jump.jump_number,
                message,
            };

            if !is_valid_interval(jump.start_time, jump.end_time) {
                return Err(invariant(format!(
                    "startTime {} must be before endTime {}",
                    jump.start_time, jump.end_time
                )));
            }

            let mut previous_end: Option<f64> = None;
            for (index, phase) in jump.phases.iter().enumerate() {
                if !is_valid_interval(phase.start_time, phase.end_time) {
                    return Err(invariant(format!(
                        "phase {} ({}) startTime {} must be before endTime {}",
                        index, phase.phase_name, phase.start_time, phase.end_time
                    )));
                }
                if let Some(end) = previous_end
                    && phase.start_time < end
                {
                    return Err(invariant(format!(
                        "phase {} ({}) starts at {} before the previous phase ends at {}",
                        index, phase.phase_name, phase.start_time, end
                    )));
                }
                if !(MIN_PHASE_SCORE..=MAX_PHASE_SCORE).contains(&phase.score) {
                    return Err(invariant(format!(
                        "phase {} ({}) score {} is outside [1, 10]",
                        index, phase.phase_name, phase.score
                    )));
                }
                previous_end = Some(phase.end_time);
            }
        }
        Ok(())
    }

    pub fn phase_count(&self) -> usize {
        self.jumps.iter().map(|jump| jump.phases.len()).sum()
    }
}

fn is_valid_interval(start: f64, end: f64) -> bool {
    start.is_finite() && end.is_finite() && start < end
}

/// ```json ... ``` のコードフェンスを外す
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}
