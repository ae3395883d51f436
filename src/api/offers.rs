use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use super::error::ApiError;
use super::users::{logo_ref, CreatedResponse};
use super::validation::{non_empty, required, validate_link};
use super::OptionalId;
use crate::auth::{Identity, SubjectPolicy};
use crate::db::{
    collections, CreateOfferRequest, Filter, OfferRecord, OfferSearchQuery, Stored,
    UpdateOfferRequest, UserRecord,
};
use crate::AppState;

pub async fn add_offer(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    Json(request): Json<CreateOfferRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    identity.deny_visitor("add offers")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let position = required(request.position.as_deref(), "position")?.to_string();
    let location = required(request.location.as_deref(), "location")?.to_string();
    let description = required(request.description.as_deref(), "description")?.to_string();
    let link = required(request.link.as_deref(), "link")?.to_string();
    validate_link(&link).map_err(ApiError::validation)?;

    let company = state
        .store
        .get_as::<UserRecord>(collections::USERS, &company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    let offer = OfferRecord {
        position,
        workplace_type: non_empty(request.workplace_type),
        location,
        job_type: non_empty(request.job_type),
        description,
        company_name: company.data.name,
        sector: non_empty(request.sector),
        logo: logo_ref(&state, &company_id).await?,
        link,
        company_id,
        created_at: Utc::now(),
        updated_at: None,
    };
    let offer_id = state.store.add_as(collections::OFFERS, &offer).await?;

    tracing::info!(company_id = %offer.company_id, offer_id = %offer_id, "Offer added");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Offer added successfully",
            id: offer_id,
        }),
    ))
}

pub async fn company_offers(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
) -> Result<Json<Value>, ApiError> {
    let company_id = super::subject(SubjectPolicy::SelfOrPublic, &identity, &id)?;
    let offers = state
        .store
        .find_as::<OfferRecord>(
            collections::OFFERS,
            &[Filter::eq("companyId", company_id.as_str())],
        )
        .await?;
    Ok(Json(serde_json::json!({ "offers": offers })))
}

/// Load an offer the caller may modify: admins any, companies their own.
async fn owned_offer(
    state: &AppState,
    identity: &Identity,
    offer_id: &str,
) -> Result<Stored<OfferRecord>, ApiError> {
    let offer = state
        .store
        .get_as::<OfferRecord>(collections::OFFERS, offer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Offer not found"))?;

    if !identity.is_admin() && offer.data.company_id != identity.id {
        tracing::warn!(user_id = %identity.id, offer_id = %offer_id, "Denied access to another company's offer");
        return Err(ApiError::forbidden(
            "Access denied: Companies can only modify their own offers.",
        ));
    }
    Ok(offer)
}

pub async fn update_offer(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(offer_id): Path<String>,
    Json(request): Json<UpdateOfferRequest>,
) -> Result<Json<Value>, ApiError> {
    identity.deny_visitor("update offers")?;
    let offer = owned_offer(&state, &identity, &offer_id).await?;

    let patch = UpdateOfferRequest {
        position: non_empty(request.position),
        workplace_type: non_empty(request.workplace_type),
        location: non_empty(request.location),
        job_type: non_empty(request.job_type),
        description: non_empty(request.description),
        sector: non_empty(request.sector),
        link: non_empty(request.link),
    };
    if let Some(link) = &patch.link {
        validate_link(link).map_err(ApiError::validation)?;
    }

    let mut value = serde_json::to_value(&patch).map_err(anyhow::Error::from)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("updatedAt".to_string(), serde_json::json!(Utc::now()));
    }
    state.store.update(collections::OFFERS, &offer.id, value).await?;

    tracing::info!(offer_id = %offer.id, updated_by = %identity.id, "Offer updated");

    Ok(Json(serde_json::json!({ "message": "Offer updated successfully" })))
}

pub async fn delete_offer(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(offer_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    identity.deny_visitor("delete offers")?;
    let offer = owned_offer(&state, &identity, &offer_id).await?;

    state.store.delete(collections::OFFERS, &offer.id).await?;

    tracing::info!(offer_id = %offer.id, deleted_by = %identity.id, "Offer deleted");

    Ok(Json(serde_json::json!({ "message": "Offer deleted successfully" })))
}

pub async fn all_offers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Stored<OfferRecord>>>, ApiError> {
    let offers = state
        .store
        .find_as::<OfferRecord>(collections::OFFERS, &[])
        .await?;
    Ok(Json(offers))
}

fn search_filters(query: OfferSearchQuery) -> (Vec<Filter>, Option<String>) {
    let mut filters = Vec::new();
    let fields = [
        ("location", query.location),
        ("jobType", query.job_type),
        ("workplaceType", query.workplace_type),
        ("companyName", query.company),
        ("sector", query.sector),
    ];
    for (field, value) in fields {
        if let Some(value) = non_empty(value) {
            filters.push(Filter::eq(field, value));
        }
    }
    (filters, non_empty(query.keyword))
}

/// Equality filters run in the store; the keyword is matched afterwards.
pub async fn search_offers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OfferSearchQuery>,
) -> Result<Json<Vec<Stored<OfferRecord>>>, ApiError> {
    let (filters, keyword) = search_filters(query);
    let mut offers = state
        .store
        .find_as::<OfferRecord>(collections::OFFERS, &filters)
        .await?;

    if let Some(keyword) = keyword {
        offers.retain(|offer| offer.data.matches_keyword(&keyword));
    }
    Ok(Json(offers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_filters_skip_blank_params() {
        let query = OfferSearchQuery {
            keyword: Some("rust".into()),
            location: Some("Madrid".into()),
            job_type: Some("".into()),
            workplace_type: None,
            company: Some("Acme".into()),
            sector: Some("  ".into()),
        };
        let (filters, keyword) = search_filters(query);

        assert_eq!(
            filters,
            vec![
                Filter::eq("location", "Madrid"),
                Filter::eq("companyName", "Acme"),
            ]
        );
        assert_eq!(keyword.as_deref(), Some("rust"));
    }
}
