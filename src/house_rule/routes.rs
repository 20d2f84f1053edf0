use super::{HouseRule, HouseRuleId, HouseRuleInput, Store};
use crate::auth;
use crate::binder::Binder;
use crate::error::Result;
use crate::middleware::{Middleware, Reply};
use crate::openapi::Registry;
use crate::router::{Context, Router};
use crate::schema::Schemas;

/// Bind the house-rule routes under `/house-rules`.
pub fn bind(store: Store, router: &mut Router, registry: &mut Registry) -> Result<()> {
    let mut binder = Binder::new("/house-rules", router, registry);

    binder
        .get(
            "/",
            Schemas::new().response::<Vec<HouseRule>>(),
            [Middleware::handler_with(store.clone(), list_house_rules)],
        )?
        .post(
            "/",
            Schemas::new().body::<HouseRuleInput>(),
            [Middleware::handler_with(store.clone(), create_house_rule)],
        )?
        .post(
            "/seed",
            Schemas::new().response::<Vec<HouseRule>>(),
            [
                auth::can_access(),
                Middleware::handler_with(store.clone(), seed_house_rules),
            ],
        )?;

    binder
        .route("/:id")
        .put(
            Schemas::new()
                .body::<HouseRuleInput>()
                .params::<HouseRuleId>()
                .response::<HouseRule>(),
            [Middleware::handler_with(store.clone(), update_house_rule)],
        )?
        .delete(
            Schemas::new().params::<HouseRuleId>(),
            [Middleware::handler_with(store, delete_house_rule)],
        )?;

    Ok(())
}

async fn list_house_rules(store: Store, _ctx: Context) -> Result<Reply> {
    Reply::ok(&store.list().await?)
}

async fn create_house_rule(store: Store, ctx: Context) -> Result<Reply> {
    let input: HouseRuleInput = ctx.body()?;
    Reply::ok(&store.create(&input).await?)
}

async fn seed_house_rules(store: Store, _ctx: Context) -> Result<Reply> {
    Reply::ok(&store.reseed().await?)
}

async fn update_house_rule(store: Store, ctx: Context) -> Result<Reply> {
    let input: HouseRuleInput = ctx.body()?;
    let id: HouseRuleId = ctx.params_as()?;
    Reply::ok(&store.update(&input, id).await?)
}

async fn delete_house_rule(store: Store, ctx: Context) -> Result<Reply> {
    let id: HouseRuleId = ctx.params_as()?;
    store.delete(id).await?;
    Ok(Reply::no_content())
}
