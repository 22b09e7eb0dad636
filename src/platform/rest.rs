//! HTTP backend for the platform capability interface.
//!
//! A thin JSON client over the platform's raster API. The client is
//! pre-authenticated with a bearer token handed over at construction;
//! credential acquisition and refresh happen outside this tool. There is no
//! retry loop: any transport or remote fault aborts the pipeline and is
//! reported to the caller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::platform::RasterPlatform;
use crate::types::{
    CanopyError, CanopyResult, ExportDescriptor, ExportJob, ExportState, RasterHandle, Region,
    StyleRange,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// JSON/HTTP client for a remote raster platform.
pub struct RestPlatform {
    base_url: String,
    token: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Serialize)]
struct ClipRequest<'a> {
    region: &'a Region,
}

#[derive(Debug, Serialize)]
struct FillRequest {
    sentinel: f64,
}

#[derive(Debug, Serialize)]
struct PreviewRequest<'a> {
    region: &'a Region,
    min: f64,
    max: f64,
}

#[derive(Debug, Serialize)]
struct ExportRequest<'a> {
    raster: &'a str,
    #[serde(flatten)]
    descriptor: &'a ExportDescriptor,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    state: ExportState,
}

impl RestPlatform {
    pub fn new(base_url: &str, token: &str) -> CanopyResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("canopia/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CanopyError::Platform(format!("failed to create HTTP client: {}", e)))?;

        Ok(RestPlatform {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST `body` as JSON and decode the response, mapping the remote error
    /// statuses this endpoint can produce through `map_err`.
    fn post_json<B, R, F>(&self, path: &str, body: &B, map_err: F) -> CanopyResult<R>
    where
        B: Serialize,
        R: serde::de::DeserializeOwned,
        F: FnOnce(u16, String) -> CanopyError,
    {
        let url = self.url(path);
        log::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| CanopyError::Platform(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(map_err(status.as_u16(), message));
        }
        response
            .json()
            .map_err(|e| CanopyError::Platform(format!("failed to decode response: {}", e)))
    }

    fn remote_error(status: u16, message: String) -> CanopyError {
        CanopyError::Platform(format!("HTTP {}: {}", status, message))
    }
}

impl RasterPlatform for RestPlatform {
    fn load_raster(&self, dataset_id: &str) -> CanopyResult<RasterHandle> {
        log::info!("resolving dataset {}", dataset_id);
        self.post_json(
            &format!("/v1/datasets/{}/open", dataset_id),
            &serde_json::json!({}),
            |status, message| {
                if status == 404 {
                    CanopyError::NotFound(dataset_id.to_string())
                } else {
                    Self::remote_error(status, message)
                }
            },
        )
    }

    fn clip(&self, raster: &RasterHandle, region: &Region) -> CanopyResult<RasterHandle> {
        // Malformed rings are rejected locally before any request goes out.
        region.validate()?;
        self.post_json(
            &format!("/v1/rasters/{}/clip", raster.id),
            &ClipRequest { region },
            |status, message| {
                if status == 422 {
                    CanopyError::InvalidGeometry(message)
                } else {
                    Self::remote_error(status, message)
                }
            },
        )
    }

    fn fill_missing(&self, raster: &RasterHandle, sentinel: f64) -> CanopyResult<RasterHandle> {
        self.post_json(
            &format!("/v1/rasters/{}/fill", raster.id),
            &FillRequest { sentinel },
            Self::remote_error,
        )
    }

    fn display(
        &self,
        raster: &RasterHandle,
        region: &Region,
        style: &StyleRange,
    ) -> CanopyResult<()> {
        log::info!("requesting preview of {}", raster.id);
        let url = self.url(&format!("/v1/rasters/{}/preview", raster.id));
        // The endpoint returns an empty body on success.
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&PreviewRequest {
                region,
                min: style.min,
                max: style.max,
            })
            .send()
            .map_err(|e| CanopyError::Platform(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(Self::remote_error(status.as_u16(), message));
        }
        Ok(())
    }

    fn export_to_storage(
        &self,
        raster: &RasterHandle,
        descriptor: &ExportDescriptor,
    ) -> CanopyResult<ExportJob> {
        // Incomplete or over-ceiling descriptors fail synchronously, before
        // submission.
        descriptor.check_for_submission()?;
        log::info!(
            "submitting export of {} to folder {}",
            raster.id,
            descriptor.folder
        );
        self.post_json(
            "/v1/exports",
            &ExportRequest {
                raster: &raster.id,
                descriptor,
            },
            |status, message| {
                if status == 400 || status == 422 {
                    CanopyError::InvalidDescriptor(message)
                } else {
                    Self::remote_error(status, message)
                }
            },
        )
    }

    fn job_status(&self, job_id: &str) -> CanopyResult<ExportState> {
        let url = self.url(&format!("/v1/exports/{}", job_id));
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| CanopyError::Platform(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(Self::remote_error(status.as_u16(), message));
        }
        let decoded: JobStatusResponse = response
            .json()
            .map_err(|e| CanopyError::Platform(format!("failed to decode response: {}", e)))?;
        Ok(decoded.state)
    }
}
