// src/services/pdf_service.rs
//
// Colaborador de carimbo: gera a página "Registro de Assinaturas" e a
// anexa ao PDF original. A saída é determinística para entradas idênticas,
// então o sha256 do artefato final é estável.

use genpdf::{elements, style, Alignment, Element, Scale};
use image::Luma;
use lopdf::{Document as PdfDocument, Object, ObjectId};
use qrcode::QrCode;
use uuid::Uuid;

use crate::{common::error::AppError, models::signers::Signer};

// Dados do documento que entram no carimbo.
#[derive(Debug, Clone)]
pub struct StampInfo {
    pub document_id: Uuid,
    pub title: String,
    pub sha256: String,
    pub validation_url: String,
}

#[derive(Clone)]
pub struct SignatureStamper {
    fonts_dir: String,
    uploads_root: std::path::PathBuf,
}

impl SignatureStamper {
    pub fn new(fonts_dir: String, uploads_root: std::path::PathBuf) -> Self {
        Self {
            fonts_dir,
            uploads_root,
        }
    }

    /// Anexa a página de assinaturas ao PDF original e devolve os bytes do
    /// artefato carimbado. Função síncrona e pesada de CPU; os chamadores
    /// a executam em `spawn_blocking`.
    pub fn embed_signatures(
        &self,
        original_pdf: &[u8],
        signers: &[Signer],
        info: &StampInfo,
    ) -> Result<Vec<u8>, AppError> {
        let manifest = self.render_manifest(signers, info)?;
        append_pages(original_pdf, &manifest)
            .map_err(|e| anyhow::anyhow!("Falha ao anexar página de assinaturas: {}", e).into())
    }

    // A página de registro, renderizada como um PDF de uma página.
    fn render_manifest(&self, signers: &[Signer], info: &StampInfo) -> Result<Vec<u8>, AppError> {
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None)
            .map_err(|_| AppError::FontNotFound(format!("./{}", self.fonts_dir)))?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Registro de Assinaturas - {}", info.title));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(12);
        doc.set_page_decorator(decorator);

        doc.push(
            elements::Paragraph::new("REGISTRO DE ASSINATURAS")
                .styled(style::Style::new().bold().with_font_size(16)),
        );
        doc.push(elements::Paragraph::new(format!("Documento: {}", info.title)));
        doc.push(
            elements::Paragraph::new(format!("Código: {}", info.document_id))
                .styled(style::Style::new().with_font_size(9)),
        );
        doc.push(
            elements::Paragraph::new(format!(
                "Hash SHA-256 (original): {}...",
                &info.sha256[..info.sha256.len().min(20)]
            ))
            .styled(style::Style::new().with_font_size(9)),
        );
        doc.push(elements::Break::new(1.5));

        for signer in signers {
            let signed_at = signer
                .signed_at
                .map(|t| t.format("%d/%m/%Y %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "—".to_string());

            doc.push(
                elements::Paragraph::new(signer.name.clone())
                    .styled(style::Style::new().bold().with_font_size(11)),
            );

            let detail_style = style::Style::new().with_font_size(8);
            doc.push(
                elements::Paragraph::new(format!(
                    "CPF: {}",
                    signer.cpf.as_deref().unwrap_or("Não informado")
                ))
                .styled(detail_style),
            );
            doc.push(
                elements::Paragraph::new(format!("E-mail: {}", signer.email)).styled(detail_style),
            );
            doc.push(
                elements::Paragraph::new(format!("Assinado em: {}", signed_at))
                    .styled(detail_style),
            );
            doc.push(
                elements::Paragraph::new(format!(
                    "IP: {}",
                    signer.ip.as_deref().unwrap_or("—")
                ))
                .styled(detail_style),
            );
            if let Some(signature_uuid) = signer.signature_uuid {
                doc.push(
                    elements::Paragraph::new(format!("Identificador: {}", signature_uuid))
                        .styled(detail_style),
                );
            }

            // Imagem da assinatura desenhada pelo signatário, quando existe.
            if let Some(artefact_path) = &signer.signature_artefact_path {
                let absolute = self.uploads_root.join(
                    artefact_path
                        .strip_prefix("uploads/")
                        .unwrap_or(artefact_path),
                );
                if let Ok(bytes) = std::fs::read(&absolute) {
                    if let Ok(dynamic_image) = image::load_from_memory(&bytes) {
                        let pdf_image = genpdf::elements::Image::from_dynamic_image(dynamic_image)
                            .map_err(|e| {
                                anyhow::anyhow!("Falha ao embutir imagem da assinatura: {}", e)
                            })?
                            .with_scale(Scale::new(0.4, 0.4));
                        doc.push(pdf_image);
                    }
                }
            }

            doc.push(elements::Break::new(1.0));
        }

        // QR Code apontando para a validação pública do documento.
        let code = QrCode::new(info.validation_url.as_bytes())
            .map_err(|e| anyhow::anyhow!("Falha ao gerar QR Code: {}", e))?;
        let image_buffer = code.render::<Luma<u8>>().build();
        let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);
        let qr_image = genpdf::elements::Image::from_dynamic_image(dynamic_image)
            .map_err(|e| anyhow::anyhow!("Falha ao embutir QR Code: {}", e))?
            .with_scale(Scale::new(0.5, 0.5));
        doc.push(qr_image);

        let mut footer = elements::Paragraph::new(format!(
            "Valide este documento em {}",
            info.validation_url
        ));
        footer.set_alignment(Alignment::Left);
        doc.push(footer.styled(style::Style::new().italic().with_font_size(8)));

        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| anyhow::anyhow!("Falha ao renderizar página de assinaturas: {}", e))?;
        Ok(buffer)
    }
}

// Anexa as páginas de `addendum` ao fim de `original`, renumerando os
// objetos e reparentando as páginas na árvore do documento base.
fn append_pages(original: &[u8], addendum: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut base = PdfDocument::load_mem(original)?;
    let mut extra = PdfDocument::load_mem(addendum)?;

    extra.renumber_objects_with(base.max_id + 1);
    base.max_id = extra.max_id;

    let pages_id = base.catalog()?.get(b"Pages")?.as_reference()?;

    let extra_page_ids: Vec<ObjectId> = extra.get_pages().values().cloned().collect();
    if extra_page_ids.is_empty() {
        anyhow::bail!("A página de assinaturas veio vazia");
    }

    for page_id in &extra_page_ids {
        if let Ok(Object::Dictionary(dict)) = extra.get_object_mut(*page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    base.objects.extend(extra.objects);

    let pages = base.get_object_mut(pages_id)?.as_dict_mut()?;
    let previous_count = pages.get(b"Count")?.as_i64()?;
    let mut kids = pages.get(b"Kids")?.as_array()?.clone();
    kids.extend(extra_page_ids.iter().map(|id| Object::Reference(*id)));
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", previous_count + extra_page_ids.len() as i64);

    let mut out = Vec::new();
    base.save_to(&mut out)?;
    Ok(out)
}
