//! 把元数据与章节写入输出格式上下文.

use ffmpeg_next::format::context::Output;
use ffmpeg_next::{Dictionary, Rational};
use log::debug;
use xmedia_core::{Chapter, Metadata, XMediaError, XMediaResult};

/// 写入一个章节
pub fn attach_chapter(output: &mut Output, chapter: &Chapter) -> XMediaResult<()> {
    let tb = Rational::new(chapter.time_base.num, chapter.time_base.den);
    let title = chapter.title.as_deref().unwrap_or_default();
    output
        .add_chapter(chapter.id, tb, chapter.start, chapter.end, title)
        .map_err(|e| XMediaError::runtime(i32::from(e), format!("添加章节 {} 失败", chapter.id)))?;
    Ok(())
}

/// 转移全部字段与章节到输出, 字段整体替换输出原有元数据
pub fn attach(output: &mut Output, meta: Metadata) -> XMediaResult<()> {
    let (fields, chapters) = meta.into_parts();
    if !fields.is_empty() {
        let mut dict = Dictionary::new();
        for (name, value) in &fields {
            dict.set(name, value);
        }
        output.set_metadata(dict);
    }
    for chapter in &chapters {
        attach_chapter(output, chapter)?;
    }
    debug!("已写入 {} 个元数据字段, {} 个章节", fields.len(), chapters.len());
    Ok(())
}
