use serde::{Deserialize, Serialize};

fn default_pagina() -> u32 {
    1
}

fn default_empresa() -> String {
    "1".to_string()
}

fn default_todos() -> String {
    // "3" means no filtering on that axis
    "3".to_string()
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    50
}

fn default_limit() -> usize {
    20
}

fn default_ativo() -> String {
    "S".to_string()
}

fn default_tipo_todos() -> String {
    "todos".to_string()
}

/// Query parameters for GET /api/sankhya/titulos-receber.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitulosQueryParams {
    #[serde(default = "default_pagina")]
    pub pagina: u32,
    #[serde(default = "default_empresa")]
    pub codigo_empresa: String,
    #[serde(default)]
    pub codigo_parceiro: String,
    /// "1" = Real, "2" = Provisão, "3" = both.
    #[serde(default = "default_todos")]
    pub status_financeiro: String,
    /// "1" = pending, "2" = settled, "3" = both.
    #[serde(default = "default_todos")]
    pub tipo_financeiro: String,
    #[serde(default)]
    pub data_negociacao_inicio: String,
    #[serde(default)]
    pub data_negociacao_final: String,
}

/// Query parameters for GET /api/sankhya/parceiros.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParceirosQueryParams {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub search_name: String,
    #[serde(default)]
    pub search_code: String,
    #[serde(default)]
    pub cod_vendedor: String,
    /// "true" widens the seller filter to the manager's whole team.
    #[serde(default)]
    pub is_gerente: String,
}

/// Query parameters for the quick-search endpoints (partners and products).
/// `termo` and `q` are interchangeable.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQueryParams {
    #[serde(default)]
    pub termo: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl SearchQueryParams {
    pub fn term(&self) -> &str {
        self.termo
            .as_deref()
            .or(self.q.as_deref())
            .unwrap_or("")
            .trim()
    }
}

/// Query parameters for GET /api/leads/atividades.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtividadesQueryParams {
    #[serde(default)]
    pub cod_lead: String,
    #[serde(default = "default_ativo")]
    pub ativo: String,
}

/// Query parameters for GET /api/vendedores.
#[derive(Debug, Clone, Deserialize)]
pub struct VendedoresQueryParams {
    /// "todos", "vendedores" or "gerentes".
    #[serde(default = "default_tipo_todos")]
    pub tipo: String,
}

/// Query parameters for the product stock/price endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProdutoQueryParams {
    #[serde(default)]
    pub cod_prod: String,
}

/// Body of POST /api/auth/login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Authenticated portal user, resolved from the seller registry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalUser {
    pub email: String,
    pub nome: String,
    /// "Vendedor", "Gerente" or "Administrador".
    pub role: String,
    pub cod_vendedor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: PortalUser,
}

/// Partner record as stored in the ERP (TGFPAR). Field names follow the
/// ERP's data dictionary so the frontend can index rows directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parceiro {
    #[serde(rename = "CODPARC")]
    pub cod_parc: String,
    #[serde(rename = "NOMEPARC")]
    pub nome_parc: String,
    #[serde(rename = "RAZAOSOCIAL", default)]
    pub razao_social: Option<String>,
    #[serde(rename = "CGC_CPF", default)]
    pub cgc_cpf: Option<String>,
    #[serde(rename = "CODCID", default)]
    pub cod_cid: Option<String>,
    #[serde(rename = "ATIVO", default)]
    pub ativo: Option<String>,
    #[serde(rename = "TIPPESSOA", default)]
    pub tip_pessoa: Option<String>,
    #[serde(rename = "CODVEND", default)]
    pub cod_vend: Option<String>,
    #[serde(rename = "CLIENTE", default)]
    pub cliente: Option<String>,
}

/// Paged partner listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParceirosPage {
    pub parceiros: Vec<Parceiro>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParceiroSearchResponse {
    pub parceiros: Vec<Parceiro>,
    pub total: usize,
}

/// Body of POST /api/sankhya/parceiros/salvar. `CODPARC` present means
/// update, absent means insert.
#[derive(Debug, Clone, Deserialize)]
pub struct ParceiroSalvarRequest {
    #[serde(rename = "CODPARC", default)]
    pub cod_parc: Option<String>,
    #[serde(rename = "NOMEPARC", default)]
    pub nome_parc: String,
    #[serde(rename = "RAZAOSOCIAL", default)]
    pub razao_social: Option<String>,
    #[serde(rename = "CGC_CPF", default)]
    pub cgc_cpf: String,
    #[serde(rename = "CODCID", default)]
    pub cod_cid: Option<String>,
    #[serde(rename = "ATIVO", default = "default_ativo")]
    pub ativo: String,
    #[serde(rename = "TIPPESSOA", default)]
    pub tip_pessoa: Option<String>,
    #[serde(rename = "CODVEND", default)]
    pub cod_vend: Option<String>,
}

/// Body of POST /api/sankhya/parceiros/deletar.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParceiroDeletarRequest {
    #[serde(default)]
    pub cod_parceiro: String,
}

/// Product record (TGFPRO).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Produto {
    #[serde(rename = "CODPROD")]
    pub cod_prod: String,
    #[serde(rename = "DESCRPROD")]
    pub descr_prod: String,
    #[serde(rename = "REFERENCIA", default)]
    pub referencia: Option<String>,
    #[serde(rename = "MARCA", default)]
    pub marca: Option<String>,
    #[serde(rename = "CODVOL", default)]
    pub cod_vol: Option<String>,
    #[serde(rename = "ATIVO", default)]
    pub ativo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProdutoSearchResponse {
    pub produtos: Vec<Produto>,
    pub total: usize,
}

/// Per-warehouse stock figure (TGFEST).
#[derive(Debug, Clone, Serialize)]
pub struct EstoqueLocal {
    #[serde(rename = "CODLOCAL")]
    pub cod_local: String,
    #[serde(rename = "ESTOQUE")]
    pub estoque: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EstoqueResponse {
    pub estoques: Vec<EstoqueLocal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrecoResponse {
    pub preco: f64,
}

/// Lead activity (AD_LEADATIVIDADE).
#[derive(Debug, Clone, Serialize)]
pub struct Atividade {
    #[serde(rename = "CODATIVIDADE")]
    pub cod_atividade: String,
    #[serde(rename = "CODLEAD")]
    pub cod_lead: Option<String>,
    #[serde(rename = "TIPO")]
    pub tipo: String,
    #[serde(rename = "DESCRICAO")]
    pub descricao: String,
    #[serde(rename = "DADOS_COMPLEMENTARES")]
    pub dados_complementares: Option<String>,
    #[serde(rename = "CODUSUARIO")]
    pub cod_usuario: Option<String>,
    #[serde(rename = "COR")]
    pub cor: Option<String>,
    #[serde(rename = "DATA_INICIO")]
    pub data_inicio: Option<String>,
    #[serde(rename = "DATA_FIM")]
    pub data_fim: Option<String>,
    #[serde(rename = "ATIVO")]
    pub ativo: Option<String>,
}

/// Body of POST /api/leads/atividades/criar.
#[derive(Debug, Clone, Deserialize)]
pub struct AtividadeCriarRequest {
    /// Null for standalone tasks not tied to a lead.
    #[serde(rename = "CODLEAD", default)]
    pub cod_lead: Option<String>,
    #[serde(rename = "TIPO", default)]
    pub tipo: String,
    #[serde(rename = "DESCRICAO", default)]
    pub descricao: String,
    #[serde(rename = "DADOS_COMPLEMENTARES", default)]
    pub dados_complementares: Option<String>,
    #[serde(rename = "COR", default)]
    pub cor: Option<String>,
    #[serde(rename = "DATA_INICIO", default)]
    pub data_inicio: Option<String>,
    #[serde(rename = "DATA_FIM", default)]
    pub data_fim: Option<String>,
}

/// Serializable subset returned after creating an activity.
#[derive(Debug, Clone, Serialize)]
pub struct AtividadeCriadaResponse {
    #[serde(rename = "CODATIVIDADE")]
    pub cod_atividade: String,
    #[serde(rename = "CODLEAD")]
    pub cod_lead: Option<String>,
    #[serde(rename = "TIPO")]
    pub tipo: String,
    #[serde(rename = "DESCRICAO")]
    pub descricao: String,
}

/// Seller record (TGFVEN).
#[derive(Debug, Clone, Serialize)]
pub struct Vendedor {
    #[serde(rename = "CODVEND")]
    pub cod_vend: String,
    #[serde(rename = "APELIDO")]
    pub apelido: String,
    #[serde(rename = "EMAIL")]
    pub email: Option<String>,
    #[serde(rename = "TIPVEND")]
    pub tip_vend: Option<String>,
    #[serde(rename = "CODGER")]
    pub cod_ger: Option<String>,
    #[serde(rename = "ATIVO")]
    pub ativo: Option<String>,
}

/// Bank-slip block attached to each receivable.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Boleto {
    pub codigo_barras: Option<String>,
    pub nosso_numero: Option<String>,
    pub linha_digitavel: Option<String>,
    pub numero_remessa: Option<String>,
}

/// Accounts-receivable installment (TGFFIN), flattened and enriched with the
/// partner name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Titulo {
    pub nro_titulo: String,
    pub parceiro: String,
    pub cod_parceiro: String,
    pub valor: f64,
    pub data_vencimento: String,
    pub data_negociacao: String,
    /// "Aberto" or "Baixado".
    pub status: String,
    /// "Real" or "Provisão".
    pub tipo_financeiro: String,
    /// "Boleto" when the installment carries a nosso-número, else "Duplicata".
    pub tipo_titulo: String,
    pub conta_bancaria: Option<String>,
    pub historico: Option<String>,
    pub numero_parcela: u32,
    pub origem_financeiro: String,
    pub codigo_empresa: i64,
    pub codigo_natureza: i64,
    pub boleto: Boleto,
}

/// Pagination block of the receivables listing. Values are serialized as
/// strings, matching what the portal frontend expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: String,
    pub offset: String,
    pub total: String,
    pub has_more: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TitulosResponse {
    pub titulos: Vec<Titulo>,
    pub pagination: Pagination,
}
