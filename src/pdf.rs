use crate::error::RenderError;
use skia_safe::{canvas::SrcRectConstraint, pdf, Canvas, Document, Image, Paint, Rect, Size};

/// 生成完成、可供下载的文档
#[derive(Debug, Clone)]
pub struct PdfArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// `<name>-information-book.pdf`，替换掉文件名中不合法的字符
pub fn artifact_file_name(property_name: &str) -> String {
    let cleaned: String = property_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    let stem = if cleaned.is_empty() {
        "property"
    } else {
        cleaned.as_str()
    };
    format!("{stem}-information-book.pdf")
}

/// 把页面依次写入以 `out` 为输出的 skia PDF 文档。
///
/// [`PdfWriter::finish`] 成功前输出不可用；出错时调用方丢弃 `out`
pub struct PdfWriter<'a> {
    doc: Option<Document<'a>>,
    page_size: Size,
    pages: usize,
}

impl<'a> PdfWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>, title: &str, page_size: (f32, f32)) -> Self {
        let metadata = pdf::Metadata {
            title: title.to_string(),
            creator: "infobook-agent".to_string(),
            ..Default::default()
        };
        Self {
            doc: Some(pdf::new_document(out, Some(&metadata))),
            page_size: Size::new(page_size.0, page_size.1),
            pages: 0,
        }
    }

    pub fn add_page(&mut self, draw: impl FnOnce(&Canvas)) -> Result<(), RenderError> {
        let doc = self
            .doc
            .take()
            .ok_or_else(|| RenderError::Assembly("document already closed".into()))?;
        let mut on_page = doc.begin_page(self.page_size, None);
        draw(on_page.canvas());
        self.doc = Some(on_page.end_page());
        self.pages += 1;
        Ok(())
    }

    /// 新建一页，把 `image` 的 `src` 像素区域放到 `dst` (pt)
    pub fn add_image_page(&mut self, image: &Image, src: Rect, dst: Rect) -> Result<(), RenderError> {
        self.add_page(|canvas| {
            let paint = Paint::default();
            canvas.draw_image_rect(image, Some((&src, SrcRectConstraint::Strict)), dst, &paint);
        })
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn finish(mut self) -> Result<usize, RenderError> {
        let doc = self
            .doc
            .take()
            .ok_or_else(|| RenderError::Assembly("document already closed".into()))?;
        if self.pages == 0 {
            doc.abort();
            return Err(RenderError::Assembly("document has no pages".into()));
        }
        doc.close();
        Ok(self.pages)
    }
}

pub fn check_header(bytes: &[u8]) -> Result<(), RenderError> {
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(RenderError::Assembly(format!(
            "unexpected output ({} bytes, no PDF header)",
            bytes.len()
        )))
    }
}
