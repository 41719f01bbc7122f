//! Category handlers: create, list, get, update, delete

use hangar_storage::{
    Category, CategoryId, CreateCategoryParams, Store, StoreError, UpdateCategoryParams,
    Visibility,
};
use tracing::info;

use super::validate_name;
use crate::error::{missing, EngineError};
use crate::service::{Caller, GroupService};

pub async fn create_category<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    mut params: CreateCategoryParams,
) -> Result<Category, EngineError> {
    svc.require_global_admin(caller, "create categories")?;
    params.name = validate_name("category", &params.name)?;

    let category = svc
        .store
        .create_category(&params)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => {
                EngineError::conflict(format!("category '{}' already exists", params.name))
            }
            other => other.into(),
        })?;

    info!(category_id = %category.id.0, name = %category.name, "category created");
    Ok(category)
}

pub async fn list_categories<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
) -> Result<Vec<Category>, EngineError> {
    let categories = svc.store.list_categories().await?;
    if caller.is_admin {
        return Ok(categories);
    }
    Ok(categories
        .into_iter()
        .filter(|c| c.visibility == Visibility::Public)
        .collect())
}

pub async fn get_category<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    category_id: &CategoryId,
) -> Result<Category, EngineError> {
    let category = svc
        .store
        .get_category(category_id)
        .await
        .map_err(missing("category"))?;

    if category.visibility != Visibility::Public && !caller.is_admin {
        return Err(EngineError::NotFound("category"));
    }
    Ok(category)
}

pub async fn update_category<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    category_id: &CategoryId,
    mut params: UpdateCategoryParams,
) -> Result<Category, EngineError> {
    svc.require_global_admin(caller, "update categories")?;
    if let Some(name) = params.name.take() {
        params.name = Some(validate_name("category", &name)?);
    }

    let category = svc
        .store
        .update_category(category_id, &params)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => EngineError::NotFound("category"),
            StoreError::AlreadyExists => {
                EngineError::conflict("another category already uses that name")
            }
            other => other.into(),
        })?;

    info!(category_id = %category.id.0, "category updated");
    Ok(category)
}

pub async fn delete_category<S: Store>(
    svc: &GroupService<S>,
    caller: &Caller,
    category_id: &CategoryId,
    cascade: bool,
) -> Result<(), EngineError> {
    svc.require_global_admin(caller, "delete categories")?;

    svc.store
        .delete_category(category_id, cascade)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => EngineError::NotFound("category"),
            StoreError::Conflict => {
                EngineError::conflict("category still contains groups; delete with cascade")
            }
            other => other.into(),
        })?;

    info!(category_id = %category_id.0, cascade, "category deleted");
    Ok(())
}
