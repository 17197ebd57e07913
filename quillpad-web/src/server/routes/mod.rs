use crate::server::ServerRouter;

mod accounts;
mod admin;
mod assets;
mod posts;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(accounts::routes())
        .merge(admin::routes())
        .merge(assets::routes())
}
