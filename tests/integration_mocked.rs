/// Integration tests with a mocked Sankhya gateway
/// Exercises login caching, session expiry and the ERP-backed flows without a real ERP
use axum::extract::{Query, State};
use sankhya_portal_api::config::Config;
use sankhya_portal_api::errors::AppError;
use sankhya_portal_api::gateway::SankhyaGateway;
use sankhya_portal_api::handlers::{self, AppState};
use sankhya_portal_api::models::{
    AtividadeCriarRequest, ParceiroSalvarRequest, ProdutoSearchResponse, SearchQueryParams,
    TitulosQueryParams,
};
use sankhya_portal_api::query;
use sankhya_portal_api::services::{
    AtividadeService, AuthService, FinanceiroService, ParceiroService, ProdutoService,
};
use sankhya_portal_api::ttl_cache::TtlCache;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICE_PATH: &str = "/gateway/v1/mge/service.sbr";

/// Helper function to create test config
fn create_test_config(sankhya_base_url: String) -> Config {
    Config {
        port: 8080,
        sankhya_base_url,
        sankhya_token: "test-token".to_string(),
        sankhya_appkey: "test-appkey".to_string(),
        sankhya_username: "integracao@test.com".to_string(),
        sankhya_password: "test-pass".to_string(),
        produto_cache_ttl_secs: 180,
        parceiro_cache_ttl_secs: 300,
        search_cache_capacity: 100,
    }
}

fn test_gateway(mock_server: &MockServer) -> Arc<SankhyaGateway> {
    let config = create_test_config(mock_server.uri());
    Arc::new(SankhyaGateway::new(&config).expect("gateway construction"))
}

fn test_state(mock_server: &MockServer) -> Arc<AppState> {
    let config = create_test_config(mock_server.uri());
    let gateway = Arc::new(SankhyaGateway::new(&config).expect("gateway construction"));
    Arc::new(AppState {
        config,
        gateway,
        produto_search_cache: Arc::new(TtlCache::new(100)),
        parceiro_search_cache: Arc::new(TtlCache::new(100)),
        parceiro_nome_cache: moka::future::Cache::builder().build(),
    })
}

fn titulos_params(pagina: u32) -> TitulosQueryParams {
    TitulosQueryParams {
        pagina,
        codigo_empresa: "1".to_string(),
        codigo_parceiro: String::new(),
        status_financeiro: "3".to_string(),
        tipo_financeiro: "3".to_string(),
        data_negociacao_inicio: String::new(),
        data_negociacao_final: String::new(),
    }
}

fn nome_cache() -> moka::future::Cache<String, String> {
    moka::future::Cache::builder().build()
}

async fn mount_login(mock_server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "bearerToken": token })),
        )
        .mount(mock_server)
        .await;
}

/// Metadata + entity rows shaped the way the gateway returns loadRecords
/// results: positional fN objects zipped against the metadata field list.
fn entities_body(fields: &[&str], rows: &[serde_json::Value], total: &str) -> serde_json::Value {
    let field_list: Vec<serde_json::Value> =
        fields.iter().map(|name| json!({ "name": name })).collect();
    json!({
        "serviceName": "CRUDServiceProvider.loadRecords",
        "status": "1",
        "responseBody": {
            "entities": {
                "total": total,
                "metadata": { "fields": { "field": field_list } },
                "entity": rows
            }
        }
    })
}

#[tokio::test]
async fn test_token_is_cached_across_service_calls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("username", "integracao@test.com"))
        .and(header("appkey", "test-appkey"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "bearerToken": "tok-1" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(header("Authorization", "Bearer tok-1"))
        .and(query_param("outputType", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responseBody": {} })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let gateway = test_gateway(&mock_server);
    let payload = query::load_records_payload("Parceiro", &["CODPARC"], None, None, 0, 1);

    assert!(gateway.load_records(&payload).await.is_ok());
    assert!(gateway.load_records(&payload).await.is_ok());
    // Mock expectations verify the login happened exactly once
}

#[tokio::test]
async fn test_login_without_token_fails_then_recovers() {
    let mock_server = MockServer::start().await;

    // First login answers 200 but carries no token; nothing may be cached
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "1" })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "bearerToken": "tok-2" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Only the second attempt ever reaches the service endpoint
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(header("Authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responseBody": {} })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = test_gateway(&mock_server);
    let payload = query::load_records_payload("Parceiro", &["CODPARC"], None, None, 0, 1);

    let err = gateway.load_records(&payload).await.unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)));

    assert!(gateway.load_records(&payload).await.is_ok());
}

#[tokio::test]
async fn test_rejected_token_clears_session_and_relogs_next_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "bearerToken": "tok-1" })),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    // The ERP refuses the first service call; the expired session must not
    // be retried inside the same invocation
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Token expirado"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responseBody": {} })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = test_gateway(&mock_server);
    let payload = query::load_records_payload("Parceiro", &["CODPARC"], None, None, 0, 1);

    let err = gateway.load_records(&payload).await.unwrap_err();
    assert!(matches!(err, AppError::SessionExpired));

    // Next call logs in again and goes through
    assert!(gateway.load_records(&payload).await.is_ok());
}

#[tokio::test]
async fn test_erp_error_surfaces_status_and_body() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("ERP indisponível"))
        .mount(&mock_server)
        .await;

    let gateway = test_gateway(&mock_server);
    let payload = query::load_records_payload("Parceiro", &["CODPARC"], None, None, 0, 1);

    match gateway.load_records(&payload).await.unwrap_err() {
        AppError::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "ERP indisponível");
        }
        other => panic!("expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_titulos_receber_end_to_end() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    // Receivables page: one open duplicata, one settled provision boleto.
    // The second row omits several positions on purpose.
    let financeiro_body = entities_body(
        &query::TITULOS_FIELDS,
        &[
            json!({
                "f0": { "$": "1001" },
                "f1": { "$": "55" },
                "f2": { "$": "1" },
                "f3": { "$": "1500.75" },
                "f4": { "$": "15/09/2025 00:00:00" },
                "f5": { "$": "01/08/2025 00:00:00" },
                "f6": { "$": "N" }
            }),
            json!({
                "f0": { "$": "1002" },
                "f1": { "$": "99" },
                "f2": { "$": "2" },
                "f3": { "$": "200" },
                "f4": { "$": "20/09/2025 00:00:00" },
                "f5": { "$": "02/08/2025 00:00:00" },
                "f6": { "$": "S" },
                "f7": { "$": "10/08/2025 14:00:00" },
                "f10": { "$": "000123" },
                "f11": { "$": "3" },
                "f12": { "$": "Mensalidade" }
            }),
        ],
        "2",
    );
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(query_param("serviceName", "CRUDServiceProvider.loadRecords"))
        .and(body_partial_json(
            json!({ "requestBody": { "dataSet": { "rootEntity": "Financeiro" } } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(&financeiro_body))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Partner 55 resolves to a name; the single-object entity shape is what
    // the gateway produces for one-row results
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(body_partial_json(json!({
            "requestBody": { "dataSet": {
                "rootEntity": "Parceiro",
                "criteria": { "expression": { "$": "CODPARC = 55" } }
            } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseBody": {
                "entities": {
                    "total": "1",
                    "metadata": { "fields": { "field": [
                        { "name": "CODPARC" },
                        { "name": "NOMEPARC" },
                        { "name": "RAZAOSOCIAL" }
                    ] } },
                    "entity": {
                        "f0": { "$": "55" },
                        "f1": { "$": "ACME LTDA" },
                        "f2": { "$": "ACME COMERCIO LTDA" }
                    }
                }
            }
        })))
        .mount(&mock_server)
        .await;

    // Partner 99 has no record; the listing must fall back to a placeholder
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(body_partial_json(
            json!({ "requestBody": { "dataSet": { "rootEntity": "Parceiro" } } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responseBody": {} })))
        .mount(&mock_server)
        .await;

    let service = FinanceiroService::new(test_gateway(&mock_server), nome_cache());
    let response = service.consultar_titulos(&titulos_params(1)).await.unwrap();

    assert_eq!(response.titulos.len(), 2);

    let aberto = &response.titulos[0];
    assert_eq!(aberto.nro_titulo, "1001");
    assert_eq!(aberto.parceiro, "ACME LTDA");
    assert_eq!(aberto.cod_parceiro, "55");
    assert_eq!(aberto.valor, 1500.75);
    assert_eq!(aberto.data_vencimento, "15/09/2025");
    assert_eq!(aberto.data_negociacao, "01/08/2025");
    assert_eq!(aberto.status, "Aberto");
    assert_eq!(aberto.tipo_financeiro, "Real");
    assert_eq!(aberto.tipo_titulo, "Duplicata");
    assert_eq!(aberto.codigo_empresa, 1);
    assert!(aberto.conta_bancaria.is_none());

    let baixado = &response.titulos[1];
    assert_eq!(baixado.parceiro, "Parceiro 99");
    assert_eq!(baixado.status, "Baixado");
    assert_eq!(baixado.tipo_financeiro, "Provisão");
    assert_eq!(baixado.tipo_titulo, "Boleto");
    assert_eq!(baixado.conta_bancaria.as_deref(), Some("Conta 3"));
    assert_eq!(baixado.historico.as_deref(), Some("Mensalidade"));
    assert_eq!(baixado.boleto.nosso_numero.as_deref(), Some("000123"));
    assert_eq!(baixado.codigo_empresa, 2);

    // Pagination metadata stays string-typed end to end
    assert_eq!(response.pagination.page, "1");
    assert_eq!(response.pagination.offset, "0");
    assert_eq!(response.pagination.total, "2");
    assert_eq!(response.pagination.has_more, "false");
}

#[tokio::test]
async fn test_titulos_second_page_reports_has_more() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    let body = entities_body(
        &query::TITULOS_FIELDS,
        &[json!({ "f0": { "$": "2001" }, "f1": { "$": "55" } })],
        "120",
    );
    // Page 2 must translate to an absolute record offset of 50
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(body_partial_json(json!({
            "requestBody": { "dataSet": { "rootEntity": "Financeiro", "offsetPage": "50" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(body_partial_json(
            json!({ "requestBody": { "dataSet": { "rootEntity": "Parceiro" } } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responseBody": {} })))
        .mount(&mock_server)
        .await;

    let service = FinanceiroService::new(test_gateway(&mock_server), nome_cache());
    let response = service.consultar_titulos(&titulos_params(2)).await.unwrap();

    assert_eq!(response.pagination.page, "2");
    assert_eq!(response.pagination.offset, "50");
    assert_eq!(response.pagination.total, "120");
    assert_eq!(response.pagination.has_more, "true");
}

#[tokio::test]
async fn test_produtos_search_short_term_never_reaches_erp() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);

    let params = SearchQueryParams {
        termo: Some("a".to_string()),
        q: None,
        limit: 20,
    };
    let response = handlers::search_produtos(State(state), Query(params))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get(axum::http::header::CACHE_CONTROL)
            .unwrap(),
        "no-store"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["total"], 0);
    assert_eq!(body["produtos"], json!([]));

    // No login, no service call
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_produtos_search_second_hit_comes_from_cache() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    let body = entities_body(
        &query::PRODUTO_FIELDS,
        &[json!({
            "f0": { "$": "301" },
            "f1": { "$": "PARAFUSO SEXTAVADO 10MM" },
            "f3": { "$": "VONDER" },
            "f4": { "$": "UN" }
        })],
        "1",
    );
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(query_param("serviceName", "CRUDServiceProvider.loadRecords"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = test_state(&mock_server);
    let params = SearchQueryParams {
        termo: Some("parafuso".to_string()),
        q: None,
        limit: 20,
    };

    let miss = handlers::search_produtos(State(state.clone()), Query(params.clone()))
        .await
        .unwrap();
    assert_eq!(miss.headers().get("x-cache").unwrap(), "MISS");
    assert_eq!(
        miss.headers()
            .get(axum::http::header::CACHE_CONTROL)
            .unwrap(),
        "public, max-age=180"
    );

    let hit = handlers::search_produtos(State(state), Query(params))
        .await
        .unwrap();
    assert_eq!(hit.headers().get("x-cache").unwrap(), "HIT");

    let bytes = axum::body::to_bytes(hit.into_body(), usize::MAX).await.unwrap();
    let parsed: ProdutoSearchResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed.total, 1);
    assert_eq!(parsed.produtos[0].cod_prod, "301");
    assert_eq!(parsed.produtos[0].descr_prod, "PARAFUSO SEXTAVADO 10MM");
    // The loadRecords mock's expect(1) guarantees the ERP was hit only once
}

#[tokio::test]
async fn test_preco_produto_reads_first_query_cell() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(query_param("serviceName", "DbExplorerSP.executeQuery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseBody": { "rows": [[123.45]] }
        })))
        .mount(&mock_server)
        .await;

    let service = ProdutoService::new(test_gateway(&mock_server));
    let preco = service.preco("301").await.unwrap();
    assert_eq!(preco, 123.45);
}

#[tokio::test]
async fn test_preco_produto_defaults_to_zero_without_rows() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(query_param("serviceName", "DbExplorerSP.executeQuery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseBody": { "rows": [] }
        })))
        .mount(&mock_server)
        .await;

    let service = ProdutoService::new(test_gateway(&mock_server));
    let preco = service.preco("999").await.unwrap();
    assert_eq!(preco, 0.0);
}

#[tokio::test]
async fn test_salvar_parceiro_validates_before_any_erp_call() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);

    let req = ParceiroSalvarRequest {
        cod_parc: None,
        nome_parc: "   ".to_string(),
        razao_social: None,
        cgc_cpf: "12345678000199".to_string(),
        cod_cid: None,
        ativo: "S".to_string(),
        tip_pessoa: None,
        cod_vend: None,
    };

    let err = handlers::salvar_parceiro(State(state), axum::Json(req))
        .await
        .unwrap_err();
    match err {
        AppError::Validation(msg) => assert_eq!(msg, "NOMEPARC e CGC_CPF são obrigatórios"),
        other => panic!("expected Validation error, got {:?}", other),
    }

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_salvar_parceiro_insert_flags_new_client() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    // Result row aligned with the submitted field list; the generated
    // CODPARC comes back in position 0
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(query_param("serviceName", "DatasetSP.save"))
        .and(body_partial_json(json!({
            "serviceName": "DatasetSP.save",
            "requestBody": { "entityName": "Parceiro" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "responseBody": {
                "total": 1,
                "result": [[
                    "10422", "ACME LTDA", "12345678000199", "S", "5", "J", "S"
                ]]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let req = ParceiroSalvarRequest {
        cod_parc: None,
        nome_parc: "ACME LTDA".to_string(),
        razao_social: None,
        cgc_cpf: "12345678000199".to_string(),
        cod_cid: Some("5".to_string()),
        ativo: "S".to_string(),
        tip_pessoa: Some("J".to_string()),
        cod_vend: None,
    };

    let service = ParceiroService::new(test_gateway(&mock_server));
    let parceiro = service.salvar(&req).await.unwrap();

    assert_eq!(parceiro.cod_parc, "10422");
    assert_eq!(parceiro.nome_parc, "ACME LTDA");
    assert_eq!(parceiro.cod_cid.as_deref(), Some("5"));
    assert_eq!(parceiro.cliente.as_deref(), Some("S"));

    let requests = mock_server.received_requests().await.unwrap();
    let save = requests
        .iter()
        .find(|r| r.url.query().unwrap_or("").contains("DatasetSP.save"))
        .expect("save call reached the ERP");
    let body: serde_json::Value = serde_json::from_slice(&save.body).unwrap();
    assert_eq!(
        body["requestBody"]["fields"],
        json!(["CODPARC", "NOMEPARC", "CGC_CPF", "ATIVO", "CODCID", "TIPPESSOA", "CLIENTE"])
    );
    // Values are keyed by absolute field index; the generated pk has no entry
    let values = &body["requestBody"]["records"][0]["values"];
    assert!(values.get("0").is_none());
    assert_eq!(values["1"], "ACME LTDA");
    assert_eq!(values["6"], "S");
    assert!(body["requestBody"]["records"][0].get("pk").is_none());
}

#[tokio::test]
async fn test_salvar_parceiro_update_sends_pk_and_skips_client_flag() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(query_param("serviceName", "DatasetSP.save"))
        .and(body_partial_json(json!({
            "requestBody": { "entityName": "Parceiro" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "responseBody": {
                "total": 1,
                "result": [["77", "ACME NOVA LTDA", "12345678000199", "S"]]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let req = ParceiroSalvarRequest {
        cod_parc: Some("77".to_string()),
        nome_parc: "ACME NOVA LTDA".to_string(),
        razao_social: None,
        cgc_cpf: "12345678000199".to_string(),
        cod_cid: None,
        ativo: "S".to_string(),
        tip_pessoa: None,
        cod_vend: None,
    };

    let service = ParceiroService::new(test_gateway(&mock_server));
    let parceiro = service.salvar(&req).await.unwrap();

    assert_eq!(parceiro.cod_parc, "77");
    assert_eq!(parceiro.nome_parc, "ACME NOVA LTDA");

    let requests = mock_server.received_requests().await.unwrap();
    let save = requests
        .iter()
        .find(|r| r.url.query().unwrap_or("").contains("DatasetSP.save"))
        .expect("save call reached the ERP");
    let body: serde_json::Value = serde_json::from_slice(&save.body).unwrap();
    assert_eq!(body["requestBody"]["records"][0]["pk"], json!({ "CODPARC": "77" }));
    let fields = body["requestBody"]["fields"].as_array().unwrap();
    assert!(!fields.iter().any(|f| f == "CLIENTE"));
}

#[tokio::test]
async fn test_criar_atividade_validates_before_any_erp_call() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);

    let req = AtividadeCriarRequest {
        cod_lead: None,
        tipo: String::new(),
        descricao: "Retornar ligação".to_string(),
        dados_complementares: None,
        cor: None,
        data_inicio: None,
        data_fim: None,
    };

    let err = handlers::criar_atividade(State(state), axum::Json(req))
        .await
        .unwrap_err();
    match err {
        AppError::Validation(msg) => assert_eq!(msg, "TIPO e DESCRICAO são obrigatórios"),
        other => panic!("expected Validation error, got {:?}", other),
    }

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_criar_atividade_end_to_end() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    // Result row aligned with the submitted field list; CODATIVIDADE is the
    // generated pk coming back in position 0
    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(query_param("serviceName", "DatasetSP.save"))
        .and(body_partial_json(json!({
            "serviceName": "DatasetSP.save",
            "requestBody": { "entityName": "AD_LEADATIVIDADE" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "responseBody": {
                "total": 1,
                "result": [[
                    "501", "12", "Ligação", "Follow-up com cliente", "",
                    "1", null, "2025-08-25T12:00:00.000Z",
                    "2025-08-25T12:00:00.000Z", "S"
                ]]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let req = AtividadeCriarRequest {
        cod_lead: Some("12".to_string()),
        tipo: "Ligação".to_string(),
        descricao: "Follow-up com cliente".to_string(),
        dados_complementares: None,
        cor: None,
        data_inicio: None,
        data_fim: None,
    };

    let service = AtividadeService::new(test_gateway(&mock_server));
    let criada = service.criar(&req).await.unwrap();

    assert_eq!(criada.cod_atividade, "501");
    assert_eq!(criada.cod_lead.as_deref(), Some("12"));
    assert_eq!(criada.tipo, "Ligação");
    assert_eq!(criada.descricao, "Follow-up com cliente");
}

#[tokio::test]
async fn test_portal_login_maps_seller_profile() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .and(body_partial_json(
            json!({ "requestBody": { "dataSet": { "rootEntity": "Vendedor" } } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(entities_body(
            &query::VENDEDOR_FIELDS,
            &[json!({
                "f0": { "$": "4" },
                "f1": { "$": "Maria" },
                "f2": { "$": "maria@empresa.com.br" },
                "f3": { "$": "G" }
            })],
            "1",
        )))
        .mount(&mock_server)
        .await;

    let service = AuthService::new(test_gateway(&mock_server));
    let user = service
        .login("maria@empresa.com.br", "senha123")
        .await
        .unwrap();

    assert_eq!(user.email, "maria@empresa.com.br");
    assert_eq!(user.nome, "Maria");
    assert_eq!(user.role, "Gerente");
    assert_eq!(user.cod_vendedor.as_deref(), Some("4"));
}

#[tokio::test]
async fn test_portal_login_without_seller_record_is_admin() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responseBody": {} })))
        .mount(&mock_server)
        .await;

    let service = AuthService::new(test_gateway(&mock_server));
    let user = service
        .login("diretor@empresa.com.br", "senha123")
        .await
        .unwrap();

    assert_eq!(user.nome, "diretor");
    assert_eq!(user.role, "Administrador");
    assert!(user.cod_vendedor.is_none());
}

#[tokio::test]
async fn test_portal_login_rejected_credentials_map_to_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Usuário ou senha inválidos"))
        .mount(&mock_server)
        .await;

    let service = AuthService::new(test_gateway(&mock_server));
    let err = service
        .login("maria@empresa.com.br", "senha-errada")
        .await
        .unwrap_err();

    match err {
        AppError::Unauthorized(msg) => assert_eq!(msg, "E-mail ou senha inválidos"),
        other => panic!("expected Unauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_service_calls_share_one_gateway() {
    let mock_server = MockServer::start().await;

    // Concurrent cold starts may race into a handful of logins; the slot is
    // last-writer-wins so anything between 1 and 10 is acceptable
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "bearerToken": "tok-1" })),
        )
        .expect(1..=10u64)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(SERVICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responseBody": {} })))
        .expect(10)
        .mount(&mock_server)
        .await;

    let gateway = test_gateway(&mock_server);

    let mut handles = vec![];
    for _ in 0..10 {
        let gw = gateway.clone();
        handles.push(tokio::spawn(async move {
            let payload = query::load_records_payload("Parceiro", &["CODPARC"], None, None, 0, 1);
            gw.load_records(&payload).await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}
