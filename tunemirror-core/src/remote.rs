//! Read-only view of the remote catalog server.
//!
//! Each fetch returns one page of items together with the server's total
//! count for that entity type. The remote side is always authoritative.

use crate::error::Result;
use crate::model::{Album, Artist, Playlist, Song};
use crate::query::Paging;
use std::future::Future;

pub trait RemoteCatalog: Send + Sync {
    fn fetch_artists(&self, paging: &Paging) -> impl Future<Output = Result<(Vec<Artist>, u64)>> + Send;

    fn fetch_albums(&self, paging: &Paging) -> impl Future<Output = Result<(Vec<Album>, u64)>> + Send;

    fn fetch_songs(&self, paging: &Paging) -> impl Future<Output = Result<(Vec<Song>, u64)>> + Send;

    fn fetch_playlists(
        &self,
        paging: &Paging,
    ) -> impl Future<Output = Result<(Vec<Playlist>, u64)>> + Send;
}
