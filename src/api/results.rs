//! 检测历史

use log::info;

use super::error::DetectApiError;
use crate::core::detection::DetectionResult;
use crate::core::store::{open_sink, DetectionStats, ResultSink, SinkConfig};

/// 检测结果存储 - 后端由 `SinkConfig` 决定
pub struct ResultStore {
    sink: Box<dyn ResultSink>,
}

impl ResultStore {
    pub fn open(config: SinkConfig) -> Result<Self, DetectApiError> {
        let sink = open_sink(&config)?;
        info!("📦 ResultStore: opened {:?}", config);
        Ok(Self { sink })
    }

    pub fn with_sink(sink: Box<dyn ResultSink>) -> Self {
        Self { sink }
    }

    /// 保存结果，返回结果 id
    pub fn save(
        &self,
        result: &DetectionResult,
        owner: Option<&str>,
    ) -> Result<String, DetectApiError> {
        Ok(self.sink.save(result, owner)?)
    }

    /// 最新的在前
    pub fn list(&self, owner: Option<&str>) -> Result<Vec<DetectionResult>, DetectApiError> {
        Ok(self.sink.list(owner)?)
    }

    pub fn get(&self, id: &str) -> Result<DetectionResult, DetectApiError> {
        Ok(self.sink.get(id)?)
    }

    /// `owner` 为空时清空全部记录
    pub fn clear(&self, owner: Option<&str>) -> Result<usize, DetectApiError> {
        let removed = match owner {
            Some(owner) => self.sink.clear_owner(owner)?,
            None => self.sink.clear_all()?,
        };
        info!("ResultStore: cleared {} results", removed);
        Ok(removed)
    }

    pub fn stats(&self, owner: Option<&str>) -> Result<DetectionStats, DetectApiError> {
        Ok(self.sink.stats(owner)?)
    }
}
