use async_trait::async_trait;
use timetable_ics_core::{Error, Result, links::CalendarLink, push::LinkOpener};

/// 在系统浏览器中打开链接
pub struct BrowserOpener;

#[async_trait]
impl LinkOpener for BrowserOpener {
    async fn open(&self, link: &CalendarLink) -> Result<()> {
        let url = link.url.to_string();
        tokio::task::spawn_blocking(move || open::that(url))
            .await
            .map_err(|e| Error::Config(format!("browser task failed: {e}")))??;
        Ok(())
    }
}

/// `--dry-run`: print instead of opening
pub struct PrintOpener;

#[async_trait]
impl LinkOpener for PrintOpener {
    async fn open(&self, link: &CalendarLink) -> Result<()> {
        println!("  {} -> {}", link.summary, link.url);
        Ok(())
    }
}
