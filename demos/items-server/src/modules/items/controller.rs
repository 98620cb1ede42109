use super::model::CreateItem;
use super::service::ItemsService;
use crate::guards::ApiKeyGuard;
use trellis::prelude::*;

#[derive(Injectable)]
pub struct ItemsController {
    items: Arc<ItemsService>,
}

impl ItemsController {
    /// Declare the controller's routes.
    pub fn declare(registry: &mut MetadataRegistry) {
        registry
            .controller::<ItemsController>("items")
            .route(RouteDef::get("/", "list").query("limit").handler(
                |this: Arc<Self>, args: Args, _: ExecutionContext| async move {
                    let limit = args.text(0).and_then(|raw| raw.parse().ok());
                    Reply::json(&this.items.list(limit))
                },
            ))
            .route(RouteDef::get("/:id", "find_one").path_param("id").handler(
                |this: Arc<Self>, args: Args, _: ExecutionContext| async move {
                    let id = parse_id(args.text(0))?;
                    match this.items.find(id) {
                        Some(item) => Reply::json(&item),
                        None => Err(HttpException::not_found(format!("Item {id} not found")).into()),
                    }
                },
            ))
            .route(RouteDef::post("/", "create").body().handler(
                |this: Arc<Self>, args: Args, context: ExecutionContext| async move {
                    let input: CreateItem = args
                        .json(0)
                        .ok_or_else(|| HttpException::bad_request("name is required"))?;
                    let item = this.items.create(input);
                    context.response().with(|response| {
                        response.set_status(StatusCode::CREATED);
                    });
                    Reply::json(&item)
                },
            ))
            .route(
                RouteDef::delete("/:id", "remove")
                    .path_param("id")
                    .guard(GuardRef::of::<ApiKeyGuard>())
                    .handler(|this: Arc<Self>, args: Args, _: ExecutionContext| async move {
                        let id = parse_id(args.text(0))?;
                        if !this.items.remove(id) {
                            return Err(HttpException::not_found(format!("Item {id} not found")).into());
                        }
                        Reply::json(&serde_json::json!({ "deleted": id }))
                    }),
            );
    }
}

fn parse_id(raw: Option<&str>) -> Result<u64, HandlerError> {
    raw.and_then(|raw| raw.parse().ok())
        .ok_or_else(|| HttpException::bad_request("id must be a positive integer").into())
}
