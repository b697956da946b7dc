/// Stamps every element with a `data-cmx-i` document-order index, then
/// serializes the (stamped) markup along with per-element computed facts.
/// Capped so pathological documents cannot blow up the snapshot.
pub const CAPTURE_SNAPSHOT: &str = r#"
(maxElements) => {
    const all = document.querySelectorAll('*');
    const limit = Math.min(all.length, maxElements);
    const nodes = [];

    for (let i = 0; i < limit; i++) {
        const el = all[i];
        el.setAttribute('data-cmx-i', String(i));

        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        const opacity = parseFloat(style.opacity) || 0;
        const visible = rect.width > 0 && rect.height > 0
            && style.display !== 'none'
            && style.visibility !== 'hidden'
            && opacity > 0.05;

        nodes.push({
            index: i,
            width: rect.width,
            height: rect.height,
            visible,
            display: style.display,
            visibility: style.visibility,
            opacity,
            fontSize: parseFloat(style.fontSize) || 0,
            color: style.color,
            backgroundColor: style.backgroundColor,
            padding: style.padding
        });
    }

    return {
        url: document.location.href,
        html: document.documentElement.outerHTML,
        nodes
    };
}
"#;

pub const LOCATION_PROBE: &str = r#"
() => document.location.href
"#;
