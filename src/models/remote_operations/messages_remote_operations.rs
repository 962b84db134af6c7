use super::{decode_records, ensure_success, CollectionRemote, MessageRemote, RemoteClient, RemoteError};
use crate::models::remote_models::NewMessage;
use crate::models::{Message, RecordId};
use futures_util::future::{BoxFuture, FutureExt};

impl CollectionRemote<Message> for RemoteClient {
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Message>, RemoteError>> {
        async move {
            let endpoint = self.endpoint(&["messages", ""])?;
            let response = self.http.get(endpoint.clone()).send().await?;
            let raw = ensure_success(&endpoint, response)?
                .json::<Vec<serde_json::Value>>()
                .await?;
            Ok(decode_records(&endpoint, raw))
        }
        .boxed()
    }

    fn delete<'a>(&'a self, id: &'a RecordId) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            let endpoint = self.endpoint(&["messages", id.as_str()])?;
            let response = self.http.delete(endpoint.clone()).send().await?;
            ensure_success(&endpoint, response)?;
            Ok(())
        }
        .boxed()
    }
}

impl MessageRemote for RemoteClient {
    fn create<'a>(&'a self, message: &'a NewMessage) -> BoxFuture<'a, Result<Message, RemoteError>> {
        async move {
            let endpoint = self.endpoint(&["messages", ""])?;
            let response = self.http.post(endpoint.clone()).json(message).send().await?;
            let created = ensure_success(&endpoint, response)?.json::<Message>().await?;
            Ok(created)
        }
        .boxed()
    }
}
