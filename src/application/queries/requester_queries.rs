//! Requester Queries

/// 查询请求者统计
#[derive(Debug, Clone)]
pub struct GetRequester {
    pub requester_id: String,
}

/// 查询运行统计（存储、生命周期、下载）
#[derive(Debug, Clone, Default)]
pub struct GetStats;
