// ============================================================
// Layer 6 — Model Hub Client
// ============================================================
// Uploads a saved model directory to a HuggingFace-compatible
// hub over its HTTP API:
//
//   1. POST {endpoint}/api/repos/create
//        {"type": "model", "name": ..., "organization": ..., "private": ...}
//      409 Conflict means the repo already exists; that's fine.
//
//   2. POST {endpoint}/api/models/{repo_id}/preupload/main
//        {"files": [{"path": ..., "sample": <base64 of first 512 bytes>, "size": ...}]}
//      The hub answers with an uploadMode per file: "lfs" or "regular".
//
//   3. For "lfs" files, the Git LFS batch API:
//        POST {endpoint}/{repo_id}.git/info/lfs/objects/batch
//      then PUT the bytes to each returned upload href (one PUT,
//      or one per part when the action carries a chunk_size), and
//      POST the verify href if there is one. An object without
//      actions is already stored.
//
//   4. POST {endpoint}/api/models/{repo_id}/commit/main
//        Content-Type: application/x-ndjson
//        {"key": "header",  "value": {"summary": ..., "description": ""}}
//        {"key": "file",    "value": {"path": ..., "content": <base64>, "encoding": "base64"}}
//        {"key": "lfsFile", "value": {"path": ..., "algo": "sha256", "oid": ..., "size": ...}}
//
// Only the model files and the model card are sent. Epoch
// checkpoints, the training log and the comparison file stay local.
//
// The token comes from HF_TOKEN. Without it the upload is
// still attempted and the hub decides whether to accept it.
// HF_ENDPOINT points the client at another hub.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::{ACCEPT, CONTENT_TYPE, ETAG},
    StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::{collections::HashMap, fs, path::Path};

use crate::domain::traits::ModelPublisher;
use crate::infra::{
    checkpoint::{ModelDirectory, MODEL_FILES},
    report::MODEL_CARD_FILE,
};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
const TOKEN_ENV: &str = "HF_TOKEN";
const ENDPOINT_ENV: &str = "HF_ENDPOINT";
const REVISION: &str = "main";
const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";
const SAMPLE_BYTES: usize = 512;
const COMMIT_SUMMARY: &str = "Upload fine-tuned embedding model";

/// A file queued for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub path:  String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Hex SHA-256 of the content, the LFS object id.
    pub fn oid(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Lfs,
    Regular,
}

// ─── Wire types ───────────────────────────────────────────────────────────────
#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadEntry {
    path:          String,
    upload_mode:   UploadMode,
    #[serde(default)]
    should_ignore: bool,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    oid:     String,
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error:   Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href:   String,
    #[serde(default)]
    header: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code:    i64,
    message: String,
}

// ─── HubClient ────────────────────────────────────────────────────────────────
pub struct HubClient {
    http:     Client,
    endpoint: String,
    token:    Option<String>,
}

impl HubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Cannot build HTTP client")?;
        Ok(Self { http, endpoint: DEFAULT_ENDPOINT.to_string(), token })
    }

    /// Client authenticated with HF_TOKEN, if set and non-empty.
    /// HF_ENDPOINT replaces the default hub URL.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
        if token.is_none() {
            tracing::warn!("No {} in env, attempting upload anyway.", TOKEN_ENV);
        }
        let client = Self::new(token)?;
        Ok(match std::env::var(ENDPOINT_ENV) {
            Ok(endpoint) if !endpoint.trim().is_empty() => client.with_endpoint(endpoint.trim()),
            _ => client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None        => req,
        }
    }

    fn create_repo(&self, repo_id: &str, private: bool) -> Result<()> {
        let url = format!("{}/api/repos/create", self.endpoint);
        let resp = self
            .authorized(self.http.post(&url))
            .json(&create_repo_body(repo_id, private))
            .send()
            .with_context(|| format!("Cannot reach {url}"))?;

        if resp.status() == StatusCode::CONFLICT {
            tracing::debug!("Repository '{}' already exists", repo_id);
            return Ok(());
        }
        resp.error_for_status()
            .with_context(|| format!("Cannot create repository '{repo_id}'"))?;
        tracing::info!("Created repository '{}'", repo_id);
        Ok(())
    }

    /// Ask the hub how each file must be sent. Ignored files are dropped.
    fn preupload(&self, repo_id: &str, files: Vec<UploadFile>) -> Result<Vec<(UploadFile, UploadMode)>> {
        let url = format!("{}/api/models/{}/preupload/{}", self.endpoint, repo_id, REVISION);
        let resp: PreuploadResponse = self
            .authorized(self.http.post(&url))
            .json(&preupload_body(&files))
            .send()
            .with_context(|| format!("Cannot reach {url}"))?
            .error_for_status()
            .with_context(|| format!("Preupload check for '{repo_id}' was rejected"))?
            .json()
            .context("Malformed preupload response")?;

        let modes: HashMap<String, PreuploadEntry> =
            resp.files.into_iter().map(|e| (e.path.clone(), e)).collect();

        Ok(files
            .into_iter()
            .filter_map(|file| match modes.get(&file.path) {
                Some(entry) if entry.should_ignore => {
                    tracing::debug!("Hub ignores '{}'", file.path);
                    None
                }
                Some(entry) => Some((file, entry.upload_mode)),
                None        => Some((file, UploadMode::Regular)),
            })
            .collect())
    }

    /// Push the LFS objects through the batch API.
    fn upload_lfs(&self, repo_id: &str, files: &[&UploadFile]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let url = format!("{}/{}.git/info/lfs/objects/batch", self.endpoint, repo_id);
        let body = json!({
            "operation": "upload",
            "transfers": ["basic", "multipart"],
            "hash_algo": "sha256",
            "objects":   files.iter().map(|f| json!({ "oid": f.oid(), "size": f.size() })).collect::<Vec<_>>(),
        });

        let batch: LfsBatchResponse = self
            .authorized(self.http.post(&url))
            .header(ACCEPT, LFS_MEDIA_TYPE)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(serde_json::to_vec(&body)?)
            .send()
            .with_context(|| format!("Cannot reach {url}"))?
            .error_for_status()
            .with_context(|| format!("LFS batch request for '{repo_id}' was rejected"))?
            .json()
            .context("Malformed LFS batch response")?;

        let by_oid: HashMap<String, &UploadFile> = files.iter().map(|f| (f.oid(), *f)).collect();
        for object in batch.objects {
            if let Some(err) = object.error {
                bail!("LFS object {} refused ({}): {}", object.oid, err.code, err.message);
            }
            let Some(file) = by_oid.get(&object.oid) else {
                bail!("LFS batch answered for unknown object {}", object.oid);
            };
            let Some(actions) = object.actions else {
                tracing::debug!("'{}' is already stored on the hub", file.path);
                continue;
            };
            if let Some(upload) = &actions.upload {
                self.put_object(upload, file)?;
                tracing::debug!("Uploaded LFS object for '{}'", file.path);
            }
            if let Some(verify) = &actions.verify {
                let mut req = self.authorized(self.http.post(&verify.href));
                for (name, value) in &verify.header {
                    req = req.header(name.as_str(), value.as_str());
                }
                req.header(ACCEPT, LFS_MEDIA_TYPE)
                    .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
                    .body(serde_json::to_vec(&json!({ "oid": object.oid, "size": file.size() }))?)
                    .send()
                    .with_context(|| format!("Cannot reach {}", verify.href))?
                    .error_for_status()
                    .with_context(|| format!("LFS verification of '{}' failed", file.path))?;
            }
        }
        Ok(())
    }

    fn put_object(&self, upload: &LfsAction, file: &UploadFile) -> Result<()> {
        if let Some(chunk_size) = upload.header.get("chunk_size") {
            let chunk_size: usize = chunk_size
                .parse()
                .ok()
                .filter(|&n| n > 0)
                .with_context(|| format!("Invalid LFS chunk_size '{chunk_size}'"))?;
            return self.put_multipart(upload, file, chunk_size);
        }

        let mut req = self.http.put(&upload.href);
        for (name, value) in &upload.header {
            req = req.header(name.as_str(), value.as_str());
        }
        req.body(file.bytes.clone())
            .send()
            .with_context(|| format!("Cannot reach {}", upload.href))?
            .error_for_status()
            .with_context(|| format!("Upload of '{}' was rejected", file.path))?;
        Ok(())
    }

    /// Numbered header entries are the part URLs; the href completes the upload.
    fn put_multipart(&self, upload: &LfsAction, file: &UploadFile, chunk_size: usize) -> Result<()> {
        let mut part_urls: Vec<(usize, &str)> = upload
            .header
            .iter()
            .filter_map(|(key, url)| Some((key.parse().ok()?, url.as_str())))
            .collect();
        part_urls.sort_unstable_by_key(|&(number, _)| number);

        let chunks = file.bytes.chunks(chunk_size);
        if chunks.len() != part_urls.len() {
            bail!(
                "Hub expects {} parts for '{}' but it splits into {}",
                part_urls.len(),
                file.path,
                chunks.len(),
            );
        }

        let mut parts = Vec::with_capacity(part_urls.len());
        for ((number, url), chunk) in part_urls.into_iter().zip(chunks) {
            let resp = self
                .http
                .put(url)
                .body(chunk.to_vec())
                .send()
                .with_context(|| format!("Cannot reach {url}"))?
                .error_for_status()
                .with_context(|| format!("Part {number} of '{}' was rejected", file.path))?;
            let etag = resp
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .with_context(|| format!("Part {number} of '{}' came back without an ETag", file.path))?
                .to_string();
            parts.push(json!({ "partNumber": number, "etag": etag }));
        }

        self.http
            .post(&upload.href)
            .header(ACCEPT, LFS_MEDIA_TYPE)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(serde_json::to_vec(&json!({ "oid": file.oid(), "parts": parts }))?)
            .send()
            .with_context(|| format!("Cannot reach {}", upload.href))?
            .error_for_status()
            .with_context(|| format!("Completing the upload of '{}' failed", file.path))?;
        Ok(())
    }

    fn commit(&self, repo_id: &str, files: &[(UploadFile, UploadMode)]) -> Result<()> {
        let url  = format!("{}/api/models/{}/commit/{}", self.endpoint, repo_id, REVISION);
        let body = commit_payload(files, COMMIT_SUMMARY)?;

        self.authorized(self.http.post(&url))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .with_context(|| format!("Cannot reach {url}"))?
            .error_for_status()
            .with_context(|| format!("Commit to '{repo_id}' was rejected"))?;
        Ok(())
    }
}

impl ModelPublisher for HubClient {
    fn publish(&self, repo_id: &str, model_dir: &Path, private: bool) -> Result<()> {
        if !ModelDirectory::new(model_dir).holds_model() {
            bail!("No saved model in '{}' to upload", model_dir.display());
        }
        let files = collect_files(model_dir, &upload_names())?;
        tracing::info!("Uploading {} files to '{}'", files.len(), repo_id);

        self.create_repo(repo_id, private)?;
        let planned = self.preupload(repo_id, files)?;
        let lfs: Vec<&UploadFile> = planned
            .iter()
            .filter(|(_, mode)| *mode == UploadMode::Lfs)
            .map(|(file, _)| file)
            .collect();
        self.upload_lfs(repo_id, &lfs)?;
        self.commit(repo_id, &planned)
    }
}

// ─── Payloads ─────────────────────────────────────────────────────────────────
/// Split "org/name" into (Some(org), name); a bare name has no organization.
pub fn split_repo_id(repo_id: &str) -> (Option<&str>, &str) {
    match repo_id.split_once('/') {
        Some((org, name)) => (Some(org), name),
        None              => (None, repo_id),
    }
}

fn create_repo_body(repo_id: &str, private: bool) -> serde_json::Value {
    let (organization, name) = split_repo_id(repo_id);
    let mut body = json!({
        "type":    "model",
        "name":    name,
        "private": private,
    });
    if let Some(org) = organization {
        body["organization"] = json!(org);
    }
    body
}

fn preupload_body(files: &[UploadFile]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = files
        .iter()
        .map(|f| {
            let sample = &f.bytes[..f.bytes.len().min(SAMPLE_BYTES)];
            json!({ "path": f.path, "sample": STANDARD.encode(sample), "size": f.size() })
        })
        .collect();
    json!({ "files": entries })
}

/// NDJSON commit body: one header line, then one line per file.
/// LFS files are referenced by oid; regular files travel inline.
pub fn commit_payload(files: &[(UploadFile, UploadMode)], summary: &str) -> Result<String> {
    let mut lines = vec![serde_json::to_string(&json!({
        "key":   "header",
        "value": { "summary": summary, "description": "" },
    }))?];

    for (file, mode) in files {
        let line = match mode {
            UploadMode::Lfs => json!({
                "key":   "lfsFile",
                "value": {
                    "path": file.path,
                    "algo": "sha256",
                    "oid":  file.oid(),
                    "size": file.size(),
                },
            }),
            UploadMode::Regular => json!({
                "key":   "file",
                "value": {
                    "path":     file.path,
                    "content":  STANDARD.encode(&file.bytes),
                    "encoding": "base64",
                },
            }),
        };
        lines.push(serde_json::to_string(&line)?);
    }

    Ok(lines.join("\n"))
}

/// What a published model consists of.
fn upload_names() -> Vec<&'static str> {
    MODEL_FILES.iter().copied().chain([MODEL_CARD_FILE]).collect()
}

/// The named files under `dir` that exist, in the given order.
pub fn collect_files(dir: &Path, names: &[&str]) -> Result<Vec<UploadFile>> {
    let mut files = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(name);
        if !path.is_file() {
            tracing::debug!("'{}' not found, not uploading it", path.display());
            continue;
        }
        let bytes = fs::read(&path).with_context(|| format!("Cannot read '{}'", path.display()))?;
        files.push(UploadFile { path: name.to_string(), bytes });
    }
    Ok(files)
}
