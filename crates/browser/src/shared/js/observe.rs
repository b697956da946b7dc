/// Installs a MutationObserver that accumulates subtree-change batches
/// into a window-scoped queue. Each batch records the stamped index of
/// the nearest stamped ancestor of each changed root, plus the number of
/// added nodes. Idempotent.
pub const INSTALL_OBSERVER: &str = r#"
() => {
    if (window.__cmxObserver) return { installed: false };
    window.__cmxMutations = [];

    const stampOf = (node) => {
        let el = node.nodeType === 1 ? node : node.parentElement;
        while (el) {
            const stamp = el.getAttribute && el.getAttribute('data-cmx-i');
            if (stamp !== null && stamp !== undefined) return parseInt(stamp, 10);
            el = el.parentElement;
        }
        return null;
    };

    window.__cmxObserver = new MutationObserver((records) => {
        const roots = [];
        let added = 0;
        for (const r of records) {
            added += r.addedNodes.length;
            const stamp = stampOf(r.target);
            if (stamp !== null && !roots.includes(stamp)) roots.push(stamp);
        }
        if (added > 0 || roots.length > 0) {
            window.__cmxMutations.push({ roots, added });
        }
    });
    window.__cmxObserver.observe(document.documentElement, {
        childList: true,
        subtree: true
    });
    return { installed: true };
}
"#;

/// Returns and clears the accumulated batches, in delivery order.
pub const DRAIN_MUTATIONS: &str = r#"
() => {
    const batches = window.__cmxMutations || [];
    window.__cmxMutations = [];
    return batches;
}
"#;

/// Rollback path: cancel any in-flight load and navigate back.
pub const STOP_AND_BACK: &str = r#"
() => {
    window.stop();
    history.back();
    return { ok: true };
}
"#;
