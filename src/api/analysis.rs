//! 解析リクエスト
//!
//! ACTIVE になったリモートファイルを固定の指示文と一緒に generateContent へ送り、
//! 返ってきたテキストを `AnalysisResult` として検証する。中身には手を加えない。

use crate::api::auth::AuthManager;
use crate::api::client::{ApiClient, read_error_body};
use crate::api::error::InfraError;
use crate::api::types::{GenerateContentRequest, GenerateContentResponse, RemoteFileHandle};
use crate::config::Settings;
use crate::domain::analysis::AnalysisResult;
use tracing::{info, warn};

/// モデルへの指示文
pub const ANALYSIS_PROMPT: &str = r#"You are an expert equestrian show-jumping coach and biomechanics analyst.
Watch the attached video of a horse and rider and analyse every jump.

For each jump, split the effort into its phases (approach, takeoff, flight, landing, recovery)
and, for every phase, describe what the rider does, what the horse does, and one short physics
observation (balance, momentum, center of mass, rhythm). Score each phase from 1 to 10 and give
the whole jump an overall score. Times are seconds from the start of the video. Phases inside a
jump must be in time order and must not overlap, and every startTime must be before its endTime.

Respond with JSON only, no prose and no markdown, matching exactly this shape:
{
  "jumps": [
    {
      "jumpNumber": 1,
      "startTime": 0.0,
      "endTime": 0.0,
      "phases": [
        {
          "startTime": 0.0,
          "endTime": 0.0,
          "phaseName": "approach",
          "riderAnalysis": "",
          "horseAnalysis": "",
          "physicsNote": "",
          "score": 1
        }
      ],
      "overallScore": 1
    }
  ],
  "overallSummary": "",
  "suggestedImprovements": [""],
  "movementName": "",
  "similarProRider": ""
}"#;

pub struct AnalysisRequestDriver {
    client: ApiClient,
    auth: AuthManager,
    model: String,
}

impl AnalysisRequestDriver {
    pub fn new(client: ApiClient, auth: AuthManager, model: impl Into<String>) -> Self {
        Self {
            client,
            auth,
            model: model.into(),
        }
    }

    pub fn from_settings(client: ApiClient, auth: AuthManager, settings: &Settings) -> Self {
        Self::new(client, auth, settings.model.clone())
    }

    fn endpoint(&self) -> String {
        format!("/v1beta/models/{}:generateContent", self.model)
    }

    /// 解析を依頼し、検証済みの結果を返す
    ///
    /// # Errors
    /// - 非2xx → `AnalysisService`
    /// - テキストが無い → `EmptyResponse`
    /// - スキーマ・不変条件違反 → `MalformedResult`（部分的な結果は返さない）
    pub async fn request_analysis(
        &self,
        handle: &RemoteFileHandle,
    ) -> Result<AnalysisResult, InfraError> {
        let endpoint = self.endpoint();
        let request =
            GenerateContentRequest::for_file(&handle.uri, &handle.mime_type, ANALYSIS_PROMPT);

        info!(model = %self.model, file = %handle.name, "Submitting analysis request");
        let response = self
            .client
            .post_json(&endpoint, &request, &[], Some(&self.auth))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_error_body(response).await;
            return Err(InfraError::AnalysisService {
                status_code: status.as_u16(),
                message,
            });
        }

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| InfraError::malformed(format!("response envelope: {}", e)))?;

        let Some(text) = envelope.text() else {
            if let Some(reason) = envelope.block_reason() {
                warn!(reason, "Analysis prompt was blocked");
            }
            if let Some(reason) = envelope.finish_reason() {
                warn!(reason, "Analysis response carried no text");
            }
            return Err(InfraError::EmptyResponse);
        };

        let result =
            AnalysisResult::from_payload(&text).map_err(|e| InfraError::malformed(e.to_string()))?;

        info!(
            jumps = result.jumps.len(),
            phases = result.phase_count(),
            "Analysis result received"
        );
        Ok(result)
    }
}
