use std::fs;
use std::path::PathBuf;

use crate::state::{ChatState, CreatorState, MessageState};

pub struct Storage {
    base: PathBuf,
}

impl Storage {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        let path = PathBuf::from(base);
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(Self { base: path })
    }

    pub fn load_creators(&self) -> anyhow::Result<Vec<CreatorState>> {
        self.load_json("creators.json")
    }

    pub fn load_chats(&self) -> anyhow::Result<Vec<ChatState>> {
        self.load_json("chats.json")
    }

    pub fn load_messages(&self) -> anyhow::Result<Vec<MessageState>> {
        self.load_json("messages.json")
    }

    pub fn save_creators(
        &self,
        creators: impl IntoIterator<Item = CreatorState>,
    ) -> anyhow::Result<()> {
        self.save_json("creators.json", creators)
    }

    pub fn save_chats(&self, chats: impl IntoIterator<Item = ChatState>) -> anyhow::Result<()> {
        self.save_json("chats.json", chats)
    }

    pub fn save_messages(
        &self,
        messages: impl IntoIterator<Item = MessageState>,
    ) -> anyhow::Result<()> {
        self.save_json("messages.json", messages)
    }

    pub async fn save_creators_async(&self, creators: Vec<CreatorState>) -> anyhow::Result<()> {
        let base = self.base.clone();
        tokio::task::spawn_blocking(move || {
            let storage = Storage { base };
            storage.save_creators(creators)
        })
        .await??;
        Ok(())
    }

    pub async fn save_chats_async(&self, chats: Vec<ChatState>) -> anyhow::Result<()> {
        let base = self.base.clone();
        tokio::task::spawn_blocking(move || {
            let storage = Storage { base };
            storage.save_chats(chats)
        })
        .await??;
        Ok(())
    }

    pub async fn save_messages_async(&self, messages: Vec<MessageState>) -> anyhow::Result<()> {
        let base = self.base.clone();
        tokio::task::spawn_blocking(move || {
            let storage = Storage { base };
            storage.save_messages(messages)
        })
        .await??;
        Ok(())
    }

    fn load_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> anyhow::Result<Vec<T>> {
        let path = self.base.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let data = serde_json::from_str(&content)?;
        Ok(data)
    }

    fn save_json<T: serde::Serialize>(
        &self,
        file: &str,
        items: impl IntoIterator<Item = T>,
    ) -> anyhow::Result<()> {
        let path = self.base.join(file);
        let items: Vec<T> = items.into_iter().collect();
        let content = serde_json::to_string_pretty(&items)?;
        fs::write(path, content)?;
        Ok(())
    }
}
