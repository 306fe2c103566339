use crate::errors::{AppError, ResultExt};
use crate::flatten;
use crate::gateway::SankhyaGateway;
use crate::models::{
    Atividade, AtividadeCriadaResponse, AtividadeCriarRequest, Boleto, EstoqueLocal,
    Pagination, Parceiro, ParceiroSalvarRequest, ParceiroSearchResponse, ParceirosPage,
    ParceirosQueryParams, PortalUser, Produto, ProdutoSearchResponse, Titulo,
    TitulosQueryParams, TitulosResponse, Vendedor,
};
use crate::query;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Fallback user code stamped on activities created through the portal.
///
/// TODO: derive CODUSUARIO from the portal session once login responses
/// carry the ERP user code.
const COD_USUARIO_PADRAO: &str = "1";

/// Receivables (TGFFIN) queries with partner-name resolution.
pub struct FinanceiroService {
    gateway: Arc<SankhyaGateway>,
    parceiro_nomes: moka::future::Cache<String, String>,
}

impl FinanceiroService {
    pub fn new(
        gateway: Arc<SankhyaGateway>,
        parceiro_nomes: moka::future::Cache<String, String>,
    ) -> Self {
        Self {
            gateway,
            parceiro_nomes,
        }
    }

    /// Fetches one page of receivables and maps each row into the portal
    /// shape, resolving partner names along the way.
    pub async fn consultar_titulos(
        &self,
        params: &TitulosQueryParams,
    ) -> Result<TitulosResponse, AppError> {
        let criteria = query::titulos_criteria(params);
        let offset = (params.pagina.saturating_sub(1) as usize) * query::TITULOS_PAGE_SIZE;

        tracing::info!(
            "Consultando títulos a receber (página {}, empresa {})",
            params.pagina,
            params.codigo_empresa
        );
        tracing::debug!("Critério de títulos: {}", criteria);

        let payload = query::load_records_payload(
            "Financeiro",
            &query::TITULOS_FIELDS,
            Some(&criteria),
            Some("NUFIN DESC"),
            offset,
            query::TITULOS_PAGE_SIZE,
        );
        let response = self
            .gateway
            .load_records(&payload)
            .await
            .context("consulta de títulos a receber")?;

        let records = flatten::flatten_entities(&response)?;
        if records.is_empty() {
            tracing::info!("Nenhum título encontrado para os filtros informados");
            return Ok(TitulosResponse {
                titulos: Vec::new(),
                pagination: Pagination {
                    page: params.pagina.to_string(),
                    offset: offset.to_string(),
                    total: "0".to_string(),
                    has_more: "false".to_string(),
                },
            });
        }

        let mut titulos = Vec::with_capacity(records.len());
        for record in &records {
            let cod_parceiro = flatten::text(record, "CODPARC").unwrap_or_default();
            let parceiro = self.resolver_nome_parceiro(&cod_parceiro).await;
            titulos.push(titulo_from_record(record, parceiro));
        }

        let total = flatten::entities_total(&response, titulos.len());
        let has_more = offset + titulos.len() < total;
        tracing::info!("Retornando {} títulos de {} no total", titulos.len(), total);

        Ok(TitulosResponse {
            titulos,
            pagination: Pagination {
                page: params.pagina.to_string(),
                offset: offset.to_string(),
                total: total.to_string(),
                has_more: has_more.to_string(),
            },
        })
    }

    /// Resolves a partner code to its display name through the shared cache.
    ///
    /// Lookup failures degrade to a `Parceiro {cod}` placeholder so a single
    /// bad partner record cannot take down a receivables page.
    async fn resolver_nome_parceiro(&self, cod_parceiro: &str) -> String {
        let placeholder = format!("Parceiro {}", cod_parceiro);
        if cod_parceiro.is_empty() {
            return placeholder;
        }
        if let Some(nome) = self.parceiro_nomes.get(cod_parceiro).await {
            return nome;
        }

        let lookup = ParceiroService::new(self.gateway.clone())
            .nome_por_codigo(cod_parceiro)
            .await;
        match lookup {
            Ok(Some(nome)) => {
                self.parceiro_nomes
                    .insert(cod_parceiro.to_string(), nome.clone())
                    .await;
                nome
            }
            Ok(None) => placeholder,
            Err(e) => {
                tracing::warn!("Falha ao resolver nome do parceiro {}: {}", cod_parceiro, e);
                placeholder
            }
        }
    }
}

/// Maps a flattened TGFFIN row into the portal receivable shape.
fn titulo_from_record(record: &Map<String, Value>, parceiro: String) -> Titulo {
    let cod_parceiro = flatten::text(record, "CODPARC").unwrap_or_default();

    let baixado = flatten::text(record, "DHBAIXA")
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    let provisao = flatten::text(record, "PROVISAO").unwrap_or_default();
    let nosso_numero = flatten::text(record, "NOSSONUM").filter(|v| !v.is_empty());

    Titulo {
        nro_titulo: flatten::text(record, "NUFIN").unwrap_or_default(),
        parceiro,
        cod_parceiro,
        valor: flatten::number(record, "VLRDESDOB"),
        data_vencimento: flatten::text(record, "DTVENC")
            .map(|v| flatten::date_part(&v))
            .unwrap_or_default(),
        data_negociacao: flatten::text(record, "DTNEG")
            .map(|v| flatten::date_part(&v))
            .unwrap_or_default(),
        status: if baixado { "Baixado" } else { "Aberto" }.to_string(),
        tipo_financeiro: if provisao.eq_ignore_ascii_case("s") {
            "Provisão"
        } else {
            "Real"
        }
        .to_string(),
        tipo_titulo: if nosso_numero.is_some() {
            "Boleto"
        } else {
            "Duplicata"
        }
        .to_string(),
        conta_bancaria: flatten::text(record, "CODCTABCOINT")
            .filter(|v| !v.is_empty())
            .map(|c| format!("Conta {}", c)),
        historico: flatten::text(record, "HISTORICO").filter(|v| !v.is_empty()),
        numero_parcela: 1,
        origem_financeiro: "TGFFIN".to_string(),
        codigo_empresa: flatten::text(record, "CODEMP")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
        codigo_natureza: 0,
        boleto: Boleto {
            codigo_barras: None,
            nosso_numero,
            linha_digitavel: None,
            numero_remessa: None,
        },
    }
}

/// Partner (TGFPAR) listing, search and maintenance.
pub struct ParceiroService {
    gateway: Arc<SankhyaGateway>,
}

impl ParceiroService {
    pub fn new(gateway: Arc<SankhyaGateway>) -> Self {
        Self { gateway }
    }

    /// Paginated listing of active client partners, optionally filtered by
    /// name, code or owning seller.
    pub async fn listar(&self, params: &ParceirosQueryParams) -> Result<ParceirosPage, AppError> {
        let page = params.page.max(1);
        let page_size = params.page_size.clamp(1, 200);
        let offset = (page - 1) * page_size;
        let criteria = query::parceiros_list_criteria(params);

        tracing::info!("Listando parceiros (página {}, tamanho {})", page, page_size);
        tracing::debug!("Critério de parceiros: {}", criteria);

        let payload = query::load_records_payload(
            "Parceiro",
            &query::PARCEIRO_FIELDS,
            Some(&criteria),
            Some("NOMEPARC ASC"),
            offset,
            page_size,
        );
        let response = self
            .gateway
            .load_records(&payload)
            .await
            .context("listagem de parceiros")?;

        let parceiros: Vec<Parceiro> = flatten::flatten_entities(&response)?
            .iter()
            .map(parceiro_from_record)
            .collect();
        let total = flatten::entities_total(&response, parceiros.len());
        let total_pages = if total == 0 {
            0
        } else {
            (total + page_size - 1) / page_size
        };

        Ok(ParceirosPage {
            parceiros,
            total,
            page,
            page_size,
            total_pages,
        })
    }

    /// Free-text partner search used by the portal autocomplete.
    pub async fn buscar(
        &self,
        termo: &str,
        limit: usize,
    ) -> Result<ParceiroSearchResponse, AppError> {
        let criteria = query::parceiros_search_criteria(termo);
        tracing::debug!("Buscando parceiros por '{}' (limite {})", termo, limit);

        let payload = query::load_records_payload(
            "Parceiro",
            &query::PARCEIRO_FIELDS,
            Some(&criteria),
            Some("NOMEPARC ASC"),
            0,
            limit,
        );
        let response = self
            .gateway
            .load_records(&payload)
            .await
            .context("busca de parceiros")?;

        let parceiros: Vec<Parceiro> = flatten::flatten_entities(&response)?
            .iter()
            .map(parceiro_from_record)
            .collect();
        let total = parceiros.len();

        Ok(ParceiroSearchResponse { parceiros, total })
    }

    /// Looks up the display name for one partner code.
    ///
    /// Deliberately unfiltered by CLIENTE/ATIVO: receivables can point at
    /// partners the listing would hide.
    pub async fn nome_por_codigo(&self, cod_parceiro: &str) -> Result<Option<String>, AppError> {
        let criteria = format!("CODPARC = {}", cod_parceiro);
        let payload = query::load_records_payload(
            "Parceiro",
            &["CODPARC", "NOMEPARC", "RAZAOSOCIAL"],
            Some(&criteria),
            None,
            0,
            1,
        );
        let response = self.gateway.load_records(&payload).await?;
        let records = flatten::flatten_entities(&response)?;

        Ok(records.first().and_then(|record| {
            flatten::text(record, "NOMEPARC")
                .filter(|n| !n.is_empty())
                .or_else(|| flatten::text(record, "RAZAOSOCIAL").filter(|n| !n.is_empty()))
        }))
    }

    /// Creates or updates a partner through `DatasetSP.save`.
    ///
    /// Without `codParc` this is an insert and the ERP generates the code;
    /// with it the same payload becomes an update keyed by pk.
    pub async fn salvar(&self, req: &ParceiroSalvarRequest) -> Result<Parceiro, AppError> {
        let mut fields: Vec<&str> = vec!["CODPARC", "NOMEPARC", "CGC_CPF", "ATIVO"];
        let mut values: Vec<Option<Value>> = vec![
            None,
            Some(json!(req.nome_parc)),
            Some(json!(req.cgc_cpf)),
            Some(json!(req.ativo)),
        ];
        if let Some(ref razao_social) = req.razao_social {
            fields.push("RAZAOSOCIAL");
            values.push(Some(json!(razao_social)));
        }
        if let Some(ref cod_cid) = req.cod_cid {
            fields.push("CODCID");
            values.push(Some(json!(cod_cid)));
        }
        if let Some(ref tip_pessoa) = req.tip_pessoa {
            fields.push("TIPPESSOA");
            values.push(Some(json!(tip_pessoa)));
        }
        if let Some(ref cod_vend) = req.cod_vend {
            fields.push("CODVEND");
            values.push(Some(json!(cod_vend)));
        }
        // New partners must be flagged as clients or the listing filter
        // (CLIENTE = 'S') never shows them again.
        if req.cod_parc.is_none() {
            fields.push("CLIENTE");
            values.push(Some(json!("S")));
        }

        let pk = req.cod_parc.as_deref().map(|cod| ("CODPARC", cod));
        match pk {
            Some((_, cod)) => tracing::info!("Atualizando parceiro {}", cod),
            None => tracing::info!("Criando parceiro '{}'", req.nome_parc),
        }

        let payload = query::save_record_payload("Parceiro", &fields, &values, pk);
        let response = self
            .gateway
            .save_record(&payload)
            .await
            .context("gravação de parceiro")?;
        let record = flatten::decode_save_result(&fields, &response)?;

        Ok(Parceiro {
            cod_parc: flatten::text(&record, "CODPARC")
                .unwrap_or_else(|| req.cod_parc.clone().unwrap_or_default()),
            nome_parc: flatten::text(&record, "NOMEPARC").unwrap_or_else(|| req.nome_parc.clone()),
            razao_social: flatten::text(&record, "RAZAOSOCIAL")
                .or_else(|| req.razao_social.clone()),
            cgc_cpf: flatten::text(&record, "CGC_CPF").or_else(|| Some(req.cgc_cpf.clone())),
            cod_cid: flatten::text(&record, "CODCID").or_else(|| req.cod_cid.clone()),
            ativo: flatten::text(&record, "ATIVO").or_else(|| Some(req.ativo.clone())),
            tip_pessoa: flatten::text(&record, "TIPPESSOA").or_else(|| req.tip_pessoa.clone()),
            cod_vend: flatten::text(&record, "CODVEND").or_else(|| req.cod_vend.clone()),
            cliente: flatten::text(&record, "CLIENTE"),
        })
    }

    /// Soft-deletes a partner by flipping ATIVO to 'N'.
    pub async fn inativar(&self, cod_parceiro: &str) -> Result<(), AppError> {
        tracing::info!("Inativando parceiro {}", cod_parceiro);

        let fields = ["CODPARC", "ATIVO"];
        let values = [None, Some(json!("N"))];
        let payload = query::save_record_payload(
            "Parceiro",
            &fields,
            &values,
            Some(("CODPARC", cod_parceiro)),
        );
        let response = self
            .gateway
            .save_record(&payload)
            .await
            .context("inativação de parceiro")?;
        flatten::decode_save_result(&fields, &response)?;
        Ok(())
    }
}

fn parceiro_from_record(record: &Map<String, Value>) -> Parceiro {
    Parceiro {
        cod_parc: flatten::text(record, "CODPARC").unwrap_or_default(),
        nome_parc: flatten::text(record, "NOMEPARC").unwrap_or_default(),
        razao_social: flatten::text(record, "RAZAOSOCIAL"),
        cgc_cpf: flatten::text(record, "CGC_CPF"),
        cod_cid: flatten::text(record, "CODCID"),
        ativo: flatten::text(record, "ATIVO"),
        tip_pessoa: flatten::text(record, "TIPPESSOA"),
        cod_vend: flatten::text(record, "CODVEND"),
        cliente: flatten::text(record, "CLIENTE"),
    }
}

/// Product (TGFPRO) search, stock and price lookups.
pub struct ProdutoService {
    gateway: Arc<SankhyaGateway>,
}

impl ProdutoService {
    pub fn new(gateway: Arc<SankhyaGateway>) -> Self {
        Self { gateway }
    }

    /// Free-text product search over code and description.
    pub async fn buscar(
        &self,
        termo: &str,
        limit: usize,
    ) -> Result<ProdutoSearchResponse, AppError> {
        let criteria = query::produtos_search_criteria(termo);
        tracing::debug!("Buscando produtos por '{}' (limite {})", termo, limit);

        let payload = query::load_records_payload(
            "Produto",
            &query::PRODUTO_FIELDS,
            Some(&criteria),
            Some("DESCRPROD ASC"),
            0,
            limit,
        );
        let response = self
            .gateway
            .load_records(&payload)
            .await
            .context("busca de produtos")?;

        let produtos: Vec<Produto> = flatten::flatten_entities(&response)?
            .iter()
            .map(produto_from_record)
            .collect();
        let total = produtos.len();

        Ok(ProdutoSearchResponse { produtos, total })
    }

    /// Stock per warehouse location for one product.
    pub async fn estoque(&self, cod_prod: &str) -> Result<Vec<EstoqueLocal>, AppError> {
        let criteria = query::estoque_criteria(cod_prod);
        let payload = query::load_records_payload(
            "Estoque",
            &query::ESTOQUE_FIELDS,
            Some(&criteria),
            None,
            0,
            100,
        );
        let response = self
            .gateway
            .load_records(&payload)
            .await
            .context("consulta de estoque")?;

        Ok(flatten::flatten_entities(&response)?
            .iter()
            .map(|record| EstoqueLocal {
                cod_local: flatten::text(record, "CODLOCAL").unwrap_or_default(),
                estoque: flatten::text(record, "ESTOQUE").unwrap_or_default(),
            })
            .collect())
    }

    /// Current list price from the default price table.
    ///
    /// Returns zero when the ERP has no price row for the product.
    pub async fn preco(&self, cod_prod: &str) -> Result<f64, AppError> {
        let sql = query::preco_produto_sql(cod_prod);
        tracing::debug!("Consultando preço do produto {}", cod_prod);

        let response = self
            .gateway
            .execute_query(&sql)
            .await
            .context("consulta de preço")?;
        let rows = flatten::query_rows(&response)?;

        let preco = rows
            .first()
            .and_then(|row| row.first())
            .map(|value| match value {
                Value::Number(n) => n.as_f64().unwrap_or(0.0),
                Value::String(s) => s.parse().unwrap_or(0.0),
                _ => 0.0,
            })
            .unwrap_or(0.0);
        Ok(preco)
    }
}

fn produto_from_record(record: &Map<String, Value>) -> Produto {
    Produto {
        cod_prod: flatten::text(record, "CODPROD").unwrap_or_default(),
        descr_prod: flatten::text(record, "DESCRPROD").unwrap_or_default(),
        referencia: flatten::text(record, "REFERENCIA"),
        marca: flatten::text(record, "MARCA"),
        cod_vol: flatten::text(record, "CODVOL"),
        ativo: flatten::text(record, "ATIVO"),
    }
}

/// Lead activity (AD_LEADATIVIDADE) queries and creation.
pub struct AtividadeService {
    gateway: Arc<SankhyaGateway>,
}

impl AtividadeService {
    pub fn new(gateway: Arc<SankhyaGateway>) -> Self {
        Self { gateway }
    }

    /// Lists activities, newest first, optionally scoped to one lead.
    pub async fn consultar(&self, cod_lead: &str, ativo: &str) -> Result<Vec<Atividade>, AppError> {
        let criteria = query::atividades_criteria(cod_lead, ativo);
        tracing::debug!(
            "Consultando atividades (lead '{}', ativo '{}')",
            cod_lead,
            ativo
        );

        let payload = query::load_records_payload(
            "AD_LEADATIVIDADE",
            &query::ATIVIDADE_FIELDS,
            Some(&criteria),
            Some("DATA_INICIO DESC"),
            0,
            200,
        );
        let response = self
            .gateway
            .load_records(&payload)
            .await
            .context("consulta de atividades")?;

        Ok(flatten::flatten_entities(&response)?
            .iter()
            .map(atividade_from_record)
            .collect())
    }

    /// Creates an activity, filling portal defaults for omitted fields.
    ///
    /// `CODLEAD` stays null for standalone tasks; start and end default to
    /// the current instant in ISO-8601.
    pub async fn criar(
        &self,
        req: &AtividadeCriarRequest,
    ) -> Result<AtividadeCriadaResponse, AppError> {
        let agora = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let data_inicio = req.data_inicio.clone().unwrap_or_else(|| agora.clone());
        let data_fim = req.data_fim.clone().unwrap_or(agora);

        tracing::info!("Criando atividade '{}' (lead {:?})", req.tipo, req.cod_lead);

        let fields = [
            "CODATIVIDADE",
            "CODLEAD",
            "TIPO",
            "DESCRICAO",
            "DADOS_COMPLEMENTARES",
            "CODUSUARIO",
            "COR",
            "DATA_INICIO",
            "DATA_FIM",
            "ATIVO",
        ];
        let values = [
            None,
            Some(req.cod_lead.as_deref().map_or(Value::Null, |c| json!(c))),
            Some(json!(req.tipo)),
            Some(json!(req.descricao)),
            Some(json!(req.dados_complementares.clone().unwrap_or_default())),
            Some(json!(COD_USUARIO_PADRAO)),
            req.cor.as_ref().map(|c| json!(c)),
            Some(json!(data_inicio)),
            Some(json!(data_fim)),
            Some(json!("S")),
        ];

        let payload = query::save_record_payload("AD_LEADATIVIDADE", &fields, &values, None);
        let response = self
            .gateway
            .save_record(&payload)
            .await
            .context("criação de atividade")?;
        let record = flatten::decode_save_result(&fields, &response)?;

        Ok(AtividadeCriadaResponse {
            cod_atividade: flatten::text(&record, "CODATIVIDADE").unwrap_or_default(),
            cod_lead: flatten::text(&record, "CODLEAD").or_else(|| req.cod_lead.clone()),
            tipo: flatten::text(&record, "TIPO").unwrap_or_else(|| req.tipo.clone()),
            descricao: flatten::text(&record, "DESCRICAO")
                .unwrap_or_else(|| req.descricao.clone()),
        })
    }
}

fn atividade_from_record(record: &Map<String, Value>) -> Atividade {
    Atividade {
        cod_atividade: flatten::text(record, "CODATIVIDADE").unwrap_or_default(),
        cod_lead: flatten::text(record, "CODLEAD"),
        tipo: flatten::text(record, "TIPO").unwrap_or_default(),
        descricao: flatten::text(record, "DESCRICAO").unwrap_or_default(),
        dados_complementares: flatten::text(record, "DADOS_COMPLEMENTARES"),
        cod_usuario: flatten::text(record, "CODUSUARIO"),
        cor: flatten::text(record, "COR"),
        data_inicio: flatten::text(record, "DATA_INICIO"),
        data_fim: flatten::text(record, "DATA_FIM"),
        ativo: flatten::text(record, "ATIVO"),
    }
}

/// Seller (TGFVEN) listing and profile lookup.
pub struct VendedorService {
    gateway: Arc<SankhyaGateway>,
}

impl VendedorService {
    pub fn new(gateway: Arc<SankhyaGateway>) -> Self {
        Self { gateway }
    }

    /// Lists active sellers, optionally narrowed to sellers or managers.
    pub async fn listar(&self, tipo: &str) -> Result<Vec<Vendedor>, AppError> {
        let criteria = query::vendedores_criteria(tipo);
        tracing::debug!("Listando vendedores (tipo '{}')", tipo);

        let payload = query::load_records_payload(
            "Vendedor",
            &query::VENDEDOR_FIELDS,
            Some(&criteria),
            Some("APELIDO ASC"),
            0,
            500,
        );
        let response = self
            .gateway
            .load_records(&payload)
            .await
            .context("listagem de vendedores")?;

        Ok(flatten::flatten_entities(&response)?
            .iter()
            .map(vendedor_from_record)
            .collect())
    }

    /// Finds the seller whose ERP e-mail matches, case-insensitively.
    pub async fn por_email(&self, email: &str) -> Result<Option<Vendedor>, AppError> {
        let criteria = query::vendedor_email_criteria(email);
        let payload = query::load_records_payload(
            "Vendedor",
            &query::VENDEDOR_FIELDS,
            Some(&criteria),
            None,
            0,
            1,
        );
        let response = self
            .gateway
            .load_records(&payload)
            .await
            .context("busca de vendedor por e-mail")?;

        Ok(flatten::flatten_entities(&response)?
            .first()
            .map(vendedor_from_record))
    }
}

fn vendedor_from_record(record: &Map<String, Value>) -> Vendedor {
    Vendedor {
        cod_vend: flatten::text(record, "CODVEND").unwrap_or_default(),
        apelido: flatten::text(record, "APELIDO").unwrap_or_default(),
        email: flatten::text(record, "EMAIL"),
        tip_vend: flatten::text(record, "TIPVEND"),
        cod_ger: flatten::text(record, "CODGER"),
        ativo: flatten::text(record, "ATIVO"),
    }
}

/// Portal login backed by the ERP's own credential check.
pub struct AuthService {
    gateway: Arc<SankhyaGateway>,
}

impl AuthService {
    pub fn new(gateway: Arc<SankhyaGateway>) -> Self {
        Self { gateway }
    }

    /// Validates the credentials against the ERP and builds the portal
    /// profile from the matching seller record.
    ///
    /// Users without a seller record get the administrator role; a failed
    /// credential check maps to a uniform 401 so the response does not leak
    /// whether the account exists.
    pub async fn login(&self, email: &str, password: &str) -> Result<PortalUser, AppError> {
        if let Err(e) = self.gateway.login_as(email, password).await {
            tracing::warn!("Login do portal recusado para {}: {}", email, e);
            return Err(AppError::Unauthorized(
                "E-mail ou senha inválidos".to_string(),
            ));
        }
        tracing::info!("Login do portal aceito para {}", email);

        let vendedor = VendedorService::new(self.gateway.clone())
            .por_email(email)
            .await
            .context("resolução do perfil de vendedor")?;

        Ok(match vendedor {
            Some(v) => PortalUser {
                email: email.to_string(),
                nome: v.apelido.clone(),
                role: if v.tip_vend.as_deref() == Some("G") {
                    "Gerente"
                } else {
                    "Vendedor"
                }
                .to_string(),
                cod_vendedor: Some(v.cod_vend),
            },
            None => PortalUser {
                email: email.to_string(),
                nome: email.split('@').next().unwrap_or(email).to_string(),
                role: "Administrador".to_string(),
                cod_vendedor: None,
            },
        })
    }
}
