// src/services/notification_service.rs
//
// Adaptador de notificações: e-mail via Resend e WhatsApp via Z-API.
// Credenciais do tenant (TenantSettings) têm precedência; sem elas, usa as
// credenciais globais do processo. Falha de entrega nunca é fatal para o
// chamador: quem dispara decide entre aguardar e fire-and-forget.

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::{common::error::AppError, db::SettingsRepository};

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Default)]
pub struct GlobalNotificationConfig {
    pub resend_api_key: Option<String>,
    pub resend_from_email: Option<String>,
    pub zapi_instance_id: Option<String>,
    pub zapi_token: Option<String>,
    pub zapi_client_token: Option<String>,
}

#[derive(Clone)]
pub struct NotificationService {
    settings_repo: SettingsRepository,
    global: GlobalNotificationConfig,
    http: reqwest::Client,
}

impl NotificationService {
    pub fn new(
        settings_repo: SettingsRepository,
        global: GlobalNotificationConfig,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(OUTBOUND_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Falha ao construir cliente HTTP: {}", e))?;
        Ok(Self {
            settings_repo,
            global,
            http,
        })
    }

    pub async fn send_email(
        &self,
        tenant_id: Uuid,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<(), AppError> {
        let settings = self.settings_repo.get(tenant_id).await?;

        let (api_key, from) = if settings.resend_active && settings.resend_api_key.is_some() {
            (
                settings.resend_api_key.clone(),
                settings
                    .app_name
                    .clone()
                    .map(|name| format!("{} <onboarding@resend.dev>", name)),
            )
        } else {
            (
                self.global.resend_api_key.clone(),
                self.global.resend_from_email.clone(),
            )
        };

        let Some(api_key) = api_key else {
            tracing::warn!("Resend sem credenciais; e-mail para {} descartado", to);
            return Ok(());
        };
        let from = from.unwrap_or_else(|| "AssineJá <onboarding@resend.dev>".to_string());

        let response = self
            .http
            .post("https://api.resend.com/emails")
            .bearer_auth(api_key)
            .json(&json!({
                "from": from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Falha na chamada ao Resend: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Resend respondeu {}: {}", status, body).into());
        }

        tracing::info!("📧 E-mail enviado para {}", mask_recipient(to));
        Ok(())
    }

    pub async fn send_whatsapp_text(
        &self,
        tenant_id: Uuid,
        phone: &str,
        message: &str,
    ) -> Result<(), AppError> {
        let settings = self.settings_repo.get(tenant_id).await?;

        let (instance_id, token, client_token) = if settings.zapi_active
            && settings.zapi_instance_id.is_some()
            && settings.zapi_token.is_some()
        {
            (
                settings.zapi_instance_id.clone(),
                settings.zapi_token.clone(),
                settings.zapi_client_token.clone(),
            )
        } else {
            (
                self.global.zapi_instance_id.clone(),
                self.global.zapi_token.clone(),
                self.global.zapi_client_token.clone(),
            )
        };

        let (Some(instance_id), Some(token)) = (instance_id, token) else {
            tracing::warn!("Z-API sem credenciais; WhatsApp descartado");
            return Ok(());
        };

        let url = format!(
            "https://api.z-api.io/instances/{}/token/{}/send-text",
            instance_id, token
        );

        let mut request = self.http.post(&url).json(&json!({
            "phone": normalize_phone(phone),
            "message": message,
        }));
        if let Some(client_token) = client_token {
            request = request.header("Client-Token", client_token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Falha na chamada à Z-API: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Z-API respondeu {}: {}", status, body).into());
        }

        tracing::info!("📱 WhatsApp enviado para {}", mask_recipient(phone));
        Ok(())
    }
}

// Normaliza para dígitos E.164: remove não dígitos e antepõe o DDI 55
// quando o número tem cara de nacional (10 ou 11 dígitos).
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 || digits.len() == 11 {
        format!("55{}", digits)
    } else {
        digits
    }
}

// Mascara o destinatário para logs e auditoria: 2 primeiros caracteres +
// *** + sufixo (domínio do e-mail ou 2 últimos dígitos).
pub fn mask_recipient(recipient: &str) -> String {
    if let Some((local, domain)) = recipient.split_once('@') {
        let prefix: String = local.chars().take(2).collect();
        return format!("{}***@{}", prefix, domain);
    }
    let digits: Vec<char> = recipient.chars().collect();
    if digits.len() <= 4 {
        return "***".to_string();
    }
    let prefix: String = digits[..2].iter().collect();
    let suffix: String = digits[digits.len() - 2..].iter().collect();
    format!("{}***{}", prefix, suffix)
}

// Substituição literal e global dos tokens do template de conclusão.
pub fn apply_email_template(
    template: &str,
    signer_name: &str,
    doc_title: &str,
    doc_link: &str,
    doc_id: &str,
) -> String {
    template
        .replace("{{signer_name}}", signer_name)
        .replace("{{doc_title}}", doc_title)
        .replace("{{doc_link}}", doc_link)
        .replace("{{doc_id}}", doc_id)
}

pub const DEFAULT_FINAL_EMAIL_TEMPLATE: &str = "\
<p>Olá, {{signer_name}}!</p>\
<p>O documento <b>{{doc_title}}</b> foi assinado por todos os participantes.</p>\
<p>Acesse a versão final em: <a href=\"{{doc_link}}\">{{doc_link}}</a></p>\
<p>Código do documento: {{doc_id}}</p>";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telefone_nacional_ganha_ddi() {
        assert_eq!(normalize_phone("(11) 98765-4321"), "5511987654321");
        assert_eq!(normalize_phone("1187654321"), "551187654321");
    }

    #[test]
    fn telefone_com_ddi_fica_como_esta() {
        assert_eq!(normalize_phone("+55 11 98765-4321"), "5511987654321");
        assert_eq!(normalize_phone("5511987654321"), "5511987654321");
    }

    #[test]
    fn mascara_de_email_preserva_dominio() {
        assert_eq!(mask_recipient("fulano@exemplo.com"), "fu***@exemplo.com");
        assert_eq!(mask_recipient("ab@x.io"), "ab***@x.io");
    }

    #[test]
    fn mascara_de_telefone_preserva_pontas() {
        assert_eq!(mask_recipient("5511987654321"), "55***21");
        assert_eq!(mask_recipient("123"), "***");
    }

    #[test]
    fn template_substitui_todos_os_tokens() {
        let out = apply_email_template(
            "Oi {{signer_name}}, veja {{doc_title}} em {{doc_link}} ({{doc_id}}). {{doc_id}}",
            "Maria",
            "Contrato",
            "https://app/x",
            "abc",
        );
        assert_eq!(out, "Oi Maria, veja Contrato em https://app/x (abc). abc");
    }

    #[test]
    fn template_padrao_contem_os_tokens() {
        for token in ["{{signer_name}}", "{{doc_title}}", "{{doc_link}}", "{{doc_id}}"] {
            assert!(DEFAULT_FINAL_EMAIL_TEMPLATE.contains(token));
        }
    }
}
