// 该文件是 Shibie （识别） 项目的一部分。
// src/submit.rs - 识别结果发送
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::thread::{self, JoinHandle};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::HeaderValue;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::dialog::ObjectDescription;

/// 能直接作为请求头的名称原样发送，含非 ASCII 或控制字符时才做百分号编码
fn name_header(name: &str) -> String {
  match HeaderValue::from_str(name) {
    Ok(_) => name.to_string(),
    Err(_) => urlencoding::encode(name).into_owned(),
  }
}

/// 携带标签名称的请求头
pub const NAME_HEADER: &str = "name";

#[derive(Error, Debug)]
pub enum SubmitError {
  #[error("HTTP 错误: {0}")]
  Http(#[from] reqwest::Error),
  #[error("服务器返回错误状态: {0}")]
  Status(StatusCode),
}

#[derive(Debug, Clone)]
pub struct SubmissionConfig {
  /// 失败后的重试次数，0 表示只发送一次
  pub retries: u32,
  pub retry_delay: Duration,
  /// 为 None 时使用 HTTP 客户端的默认超时
  pub timeout: Option<Duration>,
  /// 是否使用系统代理设置
  pub proxy: bool,
}

impl Default for SubmissionConfig {
  fn default() -> Self {
    Self {
      retries: 0,
      retry_delay: Duration::from_secs(1),
      timeout: None,
      proxy: true,
    }
  }
}

#[derive(Debug, Clone)]
pub struct SubmissionReport {
  pub status: StatusCode,
  pub attempts: u32,
  pub body: String,
}

/// 把确认后的标签和原始图像 POST 到服务器
///
/// 请求体是拍到的原始字节，标签名称放在 `name` 请求头里。
#[derive(Clone)]
pub struct SubmissionClient {
  client: Client,
  config: SubmissionConfig,
}

impl SubmissionClient {
  pub fn new(config: SubmissionConfig) -> Result<Self, SubmitError> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout {
      builder = builder.timeout(timeout);
    }
    if !config.proxy {
      builder = builder.no_proxy();
    }
    Ok(Self {
      client: builder.build()?,
      config,
    })
  }

  pub fn config(&self) -> &SubmissionConfig {
    &self.config
  }

  pub fn request(
    &self,
    target: &Url,
    description: &ObjectDescription,
    picture: &[u8],
  ) -> RequestBuilder {
    self
      .client
      .post(target.clone())
      .header(NAME_HEADER, name_header(&description.submission_name()))
      .body(picture.to_vec())
  }

  fn send_once(
    &self,
    target: &Url,
    description: &ObjectDescription,
    picture: &[u8],
  ) -> Result<(StatusCode, String), SubmitError> {
    let response = self.request(target, description, picture).send()?;
    let status = response.status();
    if !status.is_success() {
      return Err(SubmitError::Status(status));
    }
    let body = response.text().unwrap_or_default();
    Ok((status, body))
  }

  /// 同步发送，按配置重试
  pub fn submit(
    &self,
    target: &Url,
    description: &ObjectDescription,
    picture: &[u8],
  ) -> Result<SubmissionReport, SubmitError> {
    let max_attempts = self.config.retries.saturating_add(1);
    let mut attempts = 0;
    loop {
      attempts += 1;
      debug!(
        "发送 {} ({} 字节) 到 {}，第 {} 次",
        description.name,
        picture.len(),
        target,
        attempts
      );
      match self.send_once(target, description, picture) {
        Ok((status, body)) => {
          return Ok(SubmissionReport {
            status,
            attempts,
            body,
          });
        }
        Err(e) if attempts < max_attempts => {
          warn!(
            "第 {} 次发送失败: {}，{:.2?} 后重试",
            attempts, e, self.config.retry_delay
          );
          thread::sleep(self.config.retry_delay);
        }
        Err(e) => return Err(e),
      }
    }
  }

  /// 在独立线程上发送，不阻塞调用者
  ///
  /// 结果只记录日志并交给 `on_done`，不会向调用者抛出。
  pub fn submit_in_background<F>(
    &self,
    target: Url,
    description: ObjectDescription,
    picture: Vec<u8>,
    on_done: F,
  ) -> JoinHandle<()>
  where
    F: FnOnce(Result<SubmissionReport, SubmitError>) + Send + 'static,
  {
    let client = self.clone();
    thread::spawn(move || {
      let result = client.submit(&target, &description, &picture);
      match &result {
        Ok(report) => info!(
          "发送成功: {} -> {} ({}，共 {} 次)",
          description.name, target, report.status, report.attempts
        ),
        Err(e) => warn!("发送失败: {} -> {}: {}", description.name, target, e),
      }
      on_done(result);
    })
  }
}
