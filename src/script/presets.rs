//! The built-in filters, written as scripts.
//!
//! Each preset produces the same pixels as the matching native kernel.

use crate::filters::FilterKind;

pub const GRAYSCALE: &str = "\
# visit every pixel
for (x = 0; x < width; x = x + 1) {
    for (y = 0; y < height; y = y + 1) {
        # r, g and b now hold this pixel
        loadColor(x, y);

        # integer mean of the three channels
        avg = (r + g + b) // 3;

        pixels[x, y] = rgb(avg, avg, avg);
    };
};
";

pub const SEPIA: &str = "\
for (x = 0; x < width; x = x + 1)
{
    for (y = 0; y < height; y = y + 1)
    {
        loadColor(x, y);

        # warm brown tone; + 0.5 rounds when rgb() truncates
        sr = 0.393 * r + 0.769 * g + 0.189 * b + 0.5;
        sg = 0.349 * r + 0.686 * g + 0.168 * b + 0.5;
        sb = 0.272 * r + 0.534 * g + 0.131 * b + 0.5;

        # saturate
        if (sr > 255) { sr = 255; };
        if (sg > 255) { sg = 255; };
        if (sb > 255) { sb = 255; };

        pixels[x, y] = rgb(sr, sg, sb);
    };
};
";

pub const SOBEL: &str = "\
# neighbors must come from the unmodified image
makeRef();

for (x = 0; x < width; x = x + 1)
{
    for (y = 0; y < height; y = y + 1)
    {
        rgx = 0; rgy = 0;
        ggx = 0; ggy = 0;
        bgx = 0; bgy = 0;

        # top left
        if (x != 0 && y != 0)
        {
            loadRef(x - 1, y - 1);
            rgx = rgx - r; ggx = ggx - g; bgx = bgx - b;
            rgy = rgy - r; ggy = ggy - g; bgy = bgy - b;
        };
        # top
        if (y != 0)
        {
            loadRef(x, y - 1);
            rgy = rgy - 2 * r; ggy = ggy - 2 * g; bgy = bgy - 2 * b;
        };
        # top right
        if (y != 0 && x != width - 1)
        {
            loadRef(x + 1, y - 1);
            rgx = rgx + r; ggx = ggx + g; bgx = bgx + b;
            rgy = rgy - r; ggy = ggy - g; bgy = bgy - b;
        };
        # right
        if (x != width - 1)
        {
            loadRef(x + 1, y);
            rgx = rgx + 2 * r; ggx = ggx + 2 * g; bgx = bgx + 2 * b;
        };
        # bottom right
        if (y != height - 1 && x != width - 1)
        {
            loadRef(x + 1, y + 1);
            rgx = rgx + r; ggx = ggx + g; bgx = bgx + b;
            rgy = rgy + r; ggy = ggy + g; bgy = bgy + b;
        };
        # bottom
        if (y != height - 1)
        {
            loadRef(x, y + 1);
            rgy = rgy + 2 * r; ggy = ggy + 2 * g; bgy = bgy + 2 * b;
        };
        # bottom left
        if (y != height - 1 && x != 0)
        {
            loadRef(x - 1, y + 1);
            rgx = rgx - r; ggx = ggx - g; bgx = bgx - b;
            rgy = rgy + r; ggy = ggy + g; bgy = bgy + b;
        };
        # left
        if (x != 0)
        {
            loadRef(x - 1, y);
            rgx = rgx - 2 * r; ggx = ggx - 2 * g; bgx = bgx - 2 * b;
        };

        rg = sqrt(rgx * rgx + rgy * rgy) + 0.5;
        gg = sqrt(ggx * ggx + ggy * ggy) + 0.5;
        bg = sqrt(bgx * bgx + bgy * bgy) + 0.5;

        if (rg > 255) { rg = 255; };
        if (gg > 255) { gg = 255; };
        if (bg > 255) { bg = 255; };

        pixels[x, y] = rgb(rg, gg, bg);
    };
};
";

/// Script source for a built-in filter.
pub fn for_kind(kind: FilterKind) -> &'static str {
    match kind {
        FilterKind::Grayscale => GRAYSCALE,
        FilterKind::Sepia => SEPIA,
        FilterKind::EdgeDetect => SOBEL,
    }
}
