//! Box geometry shared by detection types and the replay backends.

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Index and IoU of the candidate overlapping `target` the most.
///
/// Ties keep the earliest candidate. Returns `None` for an empty slice.
pub fn best_overlap<'a, I>(target: &[f64; 4], candidates: I) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = &'a [f64; 4]>,
{
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| (i, bbox_iou(target, c)))
        .fold(None, |best, (i, iou)| match best {
            Some((_, best_iou)) if best_iou >= iou => best,
            _ => Some((i, iou)),
        })
}
