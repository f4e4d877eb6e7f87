pub mod admin_service;
pub mod client_service;
pub mod configuration_service;
pub mod license_service;
pub mod report_service;
pub mod sample_data;

use sea_orm::{DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, Select};

use crate::models::dto::PageParams;

/// Page demandée + nombre total de lignes
pub(crate) async fn fetch_page<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    paging: PageParams,
) -> Result<(Vec<E::Model>, u64), DbErr>
where
    E: EntityTrait,
    E::Model: Sync,
{
    let paginator = select.paginate(db, paging.page_size());
    let count = paginator.num_items().await?;
    let items = paginator.fetch_page(paging.page() - 1).await?;
    Ok((items, count))
}
