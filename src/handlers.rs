use crate::auth::is_valid_email;
use crate::config::Config;
use crate::errors::AppError;
use crate::gateway::SankhyaGateway;
use crate::models::*;
use crate::services::{
    AtividadeService, AuthService, FinanceiroService, ParceiroService, ProdutoService,
    VendedorService,
};
use crate::ttl_cache::{CachedBody, TtlCache};
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Search terms below this length never reach the ERP.
const MIN_SEARCH_LEN: usize = 2;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Authenticated Sankhya gateway shared by every service.
    pub gateway: Arc<SankhyaGateway>,
    /// Checksummed product search responses, keyed by term and limit.
    pub produto_search_cache: Arc<TtlCache<CachedBody>>,
    /// Checksummed partner search responses, keyed by term and limit.
    pub parceiro_search_cache: Arc<TtlCache<CachedBody>>,
    /// Partner code -> display name, shared across receivable pages.
    pub parceiro_nome_cache: moka::future::Cache<String, String>,
}

/// Health check endpoint.
///
/// Returns the service status and version; wired outside the rate limiter
/// so orchestration probes never get throttled.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "sankhya-portal-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/auth/login
///
/// Portal sign-in. There is no local password store: the credentials are
/// verified by performing a real ERP login as that user, and the portal
/// profile is derived from the matching seller record.
///
/// # Returns
///
/// * `Result<Json<LoginResponse>, AppError>` - The portal user, 400 on
///   malformed input or 401 when the ERP refuses the credentials.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "E-mail e senha são obrigatórios".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("E-mail inválido".to_string()));
    }

    let user = AuthService::new(state.gateway.clone())
        .login(&email, &req.password)
        .await?;
    Ok(Json(LoginResponse { user }))
}

/// GET /api/sankhya/titulos-receber
///
/// Pages through receivables with the portal filters (empresa, parceiro,
/// status, tipo, período de negociação), 50 rows per page.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - Query filters; all optional with portal defaults.
///
/// # Returns
///
/// * `Result<Json<TitulosResponse>, AppError>` - Mapped receivables plus
///   string-typed pagination metadata.
pub async fn listar_titulos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TitulosQueryParams>,
) -> Result<Json<TitulosResponse>, AppError> {
    tracing::info!("GET /api/sankhya/titulos-receber - params: {:?}", params);

    let service =
        FinanceiroService::new(state.gateway.clone(), state.parceiro_nome_cache.clone());
    let response = service.consultar_titulos(&params).await?;
    Ok(Json(response))
}

/// GET /api/sankhya/parceiros
///
/// Paginated listing of active client partners.
pub async fn listar_parceiros(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ParceirosQueryParams>,
) -> Result<Json<ParceirosPage>, AppError> {
    tracing::info!("GET /api/sankhya/parceiros - params: {:?}", params);

    let page = ParceiroService::new(state.gateway.clone())
        .listar(&params)
        .await?;
    Ok(Json(page))
}

/// GET /api/sankhya/parceiros/search
///
/// Autocomplete search over partner name, corporate name and code. Results
/// are cached for five minutes; `X-Cache` reports HIT or MISS.
pub async fn search_parceiros(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Response, AppError> {
    let termo = params.term();
    let limit = params.limit.clamp(1, 50);

    if termo.chars().count() < MIN_SEARCH_LEN {
        return Ok(empty_search_response(ParceiroSearchResponse {
            parceiros: Vec::new(),
            total: 0,
        }));
    }

    let cache_key = format!("search:parceiros:{}:{}", termo, limit);
    if let Some(resposta) =
        cached_search::<ParceiroSearchResponse>(&state.parceiro_search_cache, &cache_key)
    {
        return Ok(search_response(
            resposta,
            "HIT",
            state.config.parceiro_cache_ttl_secs,
        ));
    }

    tracing::debug!("Cache MISS para {}", cache_key);
    let resultado = ParceiroService::new(state.gateway.clone())
        .buscar(&termo, limit)
        .await?;
    store_search(
        &state.parceiro_search_cache,
        cache_key,
        &resultado,
        state.config.parceiro_cache_ttl_secs,
    );
    Ok(search_response(
        resultado,
        "MISS",
        state.config.parceiro_cache_ttl_secs,
    ))
}

/// POST /api/sankhya/parceiros/salvar
///
/// Creates a partner, or updates one when `CODPARC` is present in the body.
pub async fn salvar_parceiro(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ParceiroSalvarRequest>,
) -> Result<Json<Parceiro>, AppError> {
    if req.nome_parc.trim().is_empty() || req.cgc_cpf.trim().is_empty() {
        return Err(AppError::Validation(
            "NOMEPARC e CGC_CPF são obrigatórios".to_string(),
        ));
    }

    let parceiro = ParceiroService::new(state.gateway.clone())
        .salvar(&req)
        .await?;
    Ok(Json(parceiro))
}

/// POST /api/sankhya/parceiros/deletar
///
/// Inactivates a partner (ATIVO = 'N'); the ERP record is kept.
pub async fn deletar_parceiro(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ParceiroDeletarRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let cod_parceiro = req.cod_parceiro.trim();
    if cod_parceiro.is_empty() {
        return Err(AppError::Validation("codParceiro é obrigatório".to_string()));
    }

    ParceiroService::new(state.gateway.clone())
        .inativar(cod_parceiro)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/sankhya/produtos/search
///
/// Autocomplete search over product code and description, cached for three
/// minutes. Terms under two characters short-circuit to an empty result
/// with `Cache-Control: no-store` and no outbound ERP call.
///
/// # Returns
///
/// * `Result<Response, AppError>` - `{produtos, total}` with `X-Cache` and
///   `Cache-Control` headers describing how the result was produced.
pub async fn search_produtos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Response, AppError> {
    let termo = params.term();
    let limit = params.limit.clamp(1, 50);

    if termo.chars().count() < MIN_SEARCH_LEN {
        tracing::debug!("Termo de busca curto demais; retornando lista vazia");
        return Ok(empty_search_response(ProdutoSearchResponse {
            produtos: Vec::new(),
            total: 0,
        }));
    }

    let cache_key = format!("search:produtos:{}:{}", termo, limit);
    if let Some(resposta) =
        cached_search::<ProdutoSearchResponse>(&state.produto_search_cache, &cache_key)
    {
        return Ok(search_response(
            resposta,
            "HIT",
            state.config.produto_cache_ttl_secs,
        ));
    }

    tracing::debug!("Cache MISS para {}", cache_key);
    let resultado = ProdutoService::new(state.gateway.clone())
        .buscar(&termo, limit)
        .await?;
    store_search(
        &state.produto_search_cache,
        cache_key,
        &resultado,
        state.config.produto_cache_ttl_secs,
    );
    Ok(search_response(
        resultado,
        "MISS",
        state.config.produto_cache_ttl_secs,
    ))
}

/// GET /api/sankhya/produtos/estoque
///
/// Stock per warehouse location for one product.
pub async fn estoque_produto(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProdutoQueryParams>,
) -> Result<Json<EstoqueResponse>, AppError> {
    let cod_prod = params.cod_prod.trim();
    if cod_prod.is_empty() {
        return Err(AppError::Validation("codProd é obrigatório".to_string()));
    }

    let estoques = ProdutoService::new(state.gateway.clone())
        .estoque(cod_prod)
        .await?;
    Ok(Json(EstoqueResponse { estoques }))
}

/// GET /api/sankhya/produtos/preco
///
/// Current list price for one product; zero when the ERP has no price row.
pub async fn preco_produto(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProdutoQueryParams>,
) -> Result<Json<PrecoResponse>, AppError> {
    let cod_prod = params.cod_prod.trim();
    if cod_prod.is_empty() {
        return Err(AppError::Validation("codProd é obrigatório".to_string()));
    }

    let preco = ProdutoService::new(state.gateway.clone())
        .preco(cod_prod)
        .await?;
    Ok(Json(PrecoResponse { preco }))
}

/// GET /api/leads/atividades
///
/// Lists lead activities, newest first. With no `codLead` every activity
/// matching the `ativo` flag is returned.
pub async fn listar_atividades(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AtividadesQueryParams>,
) -> Result<Json<Vec<Atividade>>, AppError> {
    let atividades = AtividadeService::new(state.gateway.clone())
        .consultar(&params.cod_lead, &params.ativo)
        .await?;
    Ok(Json(atividades))
}

/// POST /api/leads/atividades/criar
///
/// Creates a lead activity. `TIPO` and `DESCRICAO` are mandatory and are
/// checked before any ERP call is made.
pub async fn criar_atividade(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AtividadeCriarRequest>,
) -> Result<Json<AtividadeCriadaResponse>, AppError> {
    if req.tipo.trim().is_empty() || req.descricao.trim().is_empty() {
        return Err(AppError::Validation(
            "TIPO e DESCRICAO são obrigatórios".to_string(),
        ));
    }

    let criada = AtividadeService::new(state.gateway.clone())
        .criar(&req)
        .await?;
    Ok(Json(criada))
}

/// GET /api/vendedores
///
/// Lists active sellers; `tipo` narrows to `vendedores` or `gerentes`.
pub async fn listar_vendedores(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VendedoresQueryParams>,
) -> Result<Json<Vec<Vendedor>>, AppError> {
    let vendedores = VendedorService::new(state.gateway.clone())
        .listar(&params.tipo)
        .await?;
    Ok(Json(vendedores))
}

/// Short-circuit response for underlength search terms. Never cached.
fn empty_search_response<T: serde::Serialize>(body: T) -> Response {
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-store".to_string())],
        Json(body),
    )
        .into_response()
}

/// Looks a serialized search result up in the cache, discarding entries
/// that fail the checksum or no longer deserialize.
fn cached_search<T: serde::de::DeserializeOwned>(
    cache: &TtlCache<CachedBody>,
    cache_key: &str,
) -> Option<T> {
    let cached = cache.get(cache_key)?;
    let body = cached.verify()?;
    match serde_json::from_str(body) {
        Ok(parsed) => {
            tracing::debug!("Cache HIT para {}", cache_key);
            Some(parsed)
        }
        Err(e) => {
            tracing::warn!("Entrada de cache ilegível para {}: {}", cache_key, e);
            None
        }
    }
}

/// Serializes a fresh search result into the cache.
fn store_search<T: serde::Serialize>(
    cache: &TtlCache<CachedBody>,
    cache_key: String,
    body: &T,
    ttl_secs: u64,
) {
    match serde_json::to_string(body) {
        Ok(serialized) => cache.set(
            cache_key,
            CachedBody::new(serialized),
            Duration::from_secs(ttl_secs),
        ),
        Err(e) => tracing::warn!("Falha ao serializar resultado para cache: {}", e),
    }
}

/// 200 response with the cache headers the portal frontend keys on.
fn search_response<T: serde::Serialize>(
    body: T,
    cache_status: &'static str,
    max_age_secs: u64,
) -> Response {
    (
        StatusCode::OK,
        [
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", max_age_secs),
            ),
            (HeaderName::from_static("x-cache"), cache_status.to_string()),
        ],
        Json(body),
    )
        .into_response()
}
