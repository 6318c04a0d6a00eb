//! 工单轮询同步器
//!
//! 没有推送通道，新鲜度上限就是拉取频率。视图打开时拉一次，
//! 每次本地发起的变更（发消息、关单）完成后再整单拉一次。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::store::{Ticket, TicketStatus};

/// 拉取工单列表的传输抽象，生产环境由 HTTP 客户端实现
#[async_trait]
pub trait TicketFeed: Send + Sync {
    async fn fetch(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, AppError>;
}

pub struct TicketSynchronizer<F: TicketFeed> {
    feed: F,
    tab: Option<TicketStatus>,
    threads: Vec<Ticket>,
    last_refreshed_at: Option<DateTime<Utc>>,
}

impl<F: TicketFeed> TicketSynchronizer<F> {
    pub fn new(feed: F) -> Self {
        Self {
            feed,
            tab: None,
            threads: Vec::new(),
            last_refreshed_at: None,
        }
    }

    pub fn threads(&self) -> &[Ticket] {
        &self.threads
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed_at
    }

    /// 打开（或切换）状态页签时整单拉取
    pub async fn open_view(&mut self, tab: Option<TicketStatus>) -> Result<(), AppError> {
        self.tab = tab;
        self.refresh().await
    }

    /// 本地发起的变更落地后必须调用，别的客户端的动作只能等下次轮询
    pub async fn after_local_mutation(&mut self) -> Result<(), AppError> {
        self.refresh().await
    }

    pub async fn refresh(&mut self) -> Result<(), AppError> {
        self.threads = self.feed.fetch(self.tab).await?;
        self.last_refreshed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use super::*;
    use crate::store::{RegistryRole, Sender, TicketKind};

    /// 假数据源，模拟服务端的工单全集
    #[derive(Clone, Default)]
    struct FakeFeed {
        tickets: Arc<RwLock<Vec<Ticket>>>,
    }

    #[async_trait]
    impl TicketFeed for FakeFeed {
        async fn fetch(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, AppError> {
            Ok(self
                .tickets
                .read()
                .unwrap()
                .iter()
                .filter(|t| status.is_none_or(|s| t.status == s))
                .cloned()
                .collect())
        }
    }

    fn ticket(body: &str) -> Ticket {
        Ticket::new(
            TicketKind::Chat,
            "u-1".to_string(),
            RegistryRole::Client,
            body.to_string(),
        )
    }

    #[tokio::test]
    async fn open_view_pulls_current_threads() {
        let feed = FakeFeed::default();
        feed.tickets.write().unwrap().push(ticket("第一单"));

        let mut sync = TicketSynchronizer::new(feed.clone());
        assert!(sync.threads().is_empty());

        sync.open_view(None).await.unwrap();
        assert_eq!(sync.threads().len(), 1);
        assert!(sync.last_refreshed_at().is_some());
    }

    #[tokio::test]
    async fn remote_changes_only_show_up_after_refresh() {
        let feed = FakeFeed::default();
        let mut sync = TicketSynchronizer::new(feed.clone());
        sync.open_view(None).await.unwrap();
        assert!(sync.threads().is_empty());

        // 另一方新开了工单，本地视图不会自己变
        feed.tickets.write().unwrap().push(ticket("新工单"));
        assert!(sync.threads().is_empty());

        sync.refresh().await.unwrap();
        assert_eq!(sync.threads().len(), 1);
    }

    #[tokio::test]
    async fn tab_filter_sticks_across_refreshes() {
        let feed = FakeFeed::default();
        {
            let mut tickets = feed.tickets.write().unwrap();
            tickets.push(ticket("还没人管"));
            let mut closed = ticket("已经完结");
            closed.append(Sender::Admin, "处理完毕".into()).unwrap();
            closed.transition(TicketStatus::Closed).unwrap();
            tickets.push(closed);
        }

        let mut sync = TicketSynchronizer::new(feed.clone());
        sync.open_view(Some(TicketStatus::Open)).await.unwrap();
        assert_eq!(sync.threads().len(), 1);
        assert_eq!(sync.threads()[0].status, TicketStatus::Open);

        sync.after_local_mutation().await.unwrap();
        assert_eq!(sync.threads().len(), 1);
    }
}
