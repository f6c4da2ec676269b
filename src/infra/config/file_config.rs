use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{AppConfig, ChatConfig, IdentityConfig, LogConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub chat: Option<FileChatConfig>,
    pub identity: Option<FileIdentityConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(chat) = self.chat {
            chat.merge_into(&mut config.chat);
        }

        if let Some(identity) = self.identity {
            identity.merge_into(&mut config.identity);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileChatConfig {
    pub history_page_size: Option<usize>,
    pub read_signal_delay_ms: Option<u64>,
}

impl FileChatConfig {
    fn merge_into(self, config: &mut ChatConfig) {
        if let Some(page_size) = self.history_page_size {
            config.history_page_size = page_size;
        }

        if let Some(delay_ms) = self.read_signal_delay_ms {
            config.read_signal_delay_ms = delay_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileIdentityConfig {
    pub email: Option<String>,
    pub user_id: Option<i64>,
}

impl FileIdentityConfig {
    fn merge_into(self, config: &mut IdentityConfig) {
        if let Some(email) = self.email {
            config.email = email;
        }

        if let Some(user_id) = self.user_id {
            config.user_id = Some(user_id);
        }
    }
}
