/// mousedown → mouseup → click against the stamped element. When
/// `neutralizeForm` is set, the enclosing form's submit path (handler,
/// submit event, `action` attribute) is suppressed for the duration of
/// the dispatch so a button inside a form cannot trigger a page-level
/// submit; everything is restored afterwards.
pub const POINTER_CLICK: &str = r#"
(index, neutralizeForm) => {
    const el = document.querySelector('[data-cmx-i="' + index + '"]');
    if (!el) return { ok: false, reason: 'missing' };

    let form = null;
    let savedOnSubmit = null;
    let savedAction = null;
    const blockSubmit = (e) => { e.preventDefault(); e.stopImmediatePropagation(); };
    if (neutralizeForm) {
        form = el.closest('form');
        if (form) {
            savedOnSubmit = form.onsubmit;
            savedAction = form.getAttribute('action');
            form.onsubmit = () => false;
            form.setAttribute('action', 'javascript:void(0)');
            form.addEventListener('submit', blockSubmit, true);
        }
    }

    try {
        const opts = { bubbles: true, cancelable: true, view: window };
        el.dispatchEvent(new MouseEvent('mousedown', opts));
        el.dispatchEvent(new MouseEvent('mouseup', opts));
        el.click();
    } catch (e) {
        return { ok: false, reason: String(e) };
    } finally {
        if (form) {
            form.onsubmit = savedOnSubmit;
            if (savedAction === null) form.removeAttribute('action');
            else form.setAttribute('action', savedAction);
            form.removeEventListener('submit', blockSubmit, true);
        }
    }
    return { ok: true };
}
"#;

/// focus + Enter, for ARIA-role widgets that ignore synthetic mouse events.
pub const KEYBOARD_ACTIVATE: &str = r#"
(index) => {
    const el = document.querySelector('[data-cmx-i="' + index + '"]');
    if (!el) return { ok: false, reason: 'missing' };

    try {
        el.focus();
        const opts = { bubbles: true, cancelable: true, key: 'Enter', code: 'Enter', keyCode: 13 };
        el.dispatchEvent(new KeyboardEvent('keydown', opts));
        el.dispatchEvent(new KeyboardEvent('keypress', opts));
        el.dispatchEvent(new KeyboardEvent('keyup', opts));
    } catch (e) {
        return { ok: false, reason: String(e) };
    }
    return { ok: true };
}
"#;

/// Clones the node off-screen, clicks the clone, discards it. Some
/// overlay managers bind handlers by delegation, so the clone's click
/// still bubbles to them without touching the original node.
pub const CLONE_CLICK: &str = r#"
(index) => {
    const el = document.querySelector('[data-cmx-i="' + index + '"]');
    if (!el) return { ok: false, reason: 'missing' };

    const clone = el.cloneNode(true);
    clone.style.position = 'absolute';
    clone.style.left = '-9999px';
    document.body.appendChild(clone);
    try {
        clone.click();
    } catch (e) {
        return { ok: false, reason: String(e) };
    } finally {
        clone.remove();
    }
    return { ok: true };
}
"#;

pub const DIRECT_ACTIVATE: &str = r#"
(index) => {
    const el = document.querySelector('[data-cmx-i="' + index + '"]');
    if (!el) return { ok: false, reason: 'missing' };
    try {
        el.click();
    } catch (e) {
        return { ok: false, reason: String(e) };
    }
    return { ok: true };
}
"#;
