//! Prompt templates for the describe and compose calls.
//!
//! The wording is tuned by hand; what matters structurally is that the
//! compose prompt states the role, the three inputs, the lighting hint and
//! placement description verbatim, the placement and replacement rules, the
//! rendering requirements and the requested scale.

/// Used when the description call fails or returns nothing.
pub const FALLBACK_PLACEMENT: &str = "at the specified location.";

/// Instruction sent with the marked scene to the description model.
pub const DESCRIBE_PROMPT: &str = r#"
You are an expert scene analyst. The image you receive carries a red circular marker.
Describe, as densely and semantically as you can, what lies at the exact location of that marker.
Name the surfaces, materials and spatial relationships involved. Another model will use your words to place a piece of jewelry there.

Example semantic descriptions:
- "The jewelry location is on the left earlobe of the woman, just below the edge of her dark hair."
- "The jewelry location is on the ring finger of the right hand, between the first and second knuckle, resting on a white linen tablecloth."
- "The jewelry location is on the light-colored wooden dresser top, inside a soft patch of window light, beside a ceramic dish."

After the semantic description, add a rough position relative to the whole image.

Example relative descriptions:
- "The jewelry location is about 10% away from the bottom-left of the image."
- "The jewelry location is about 20% away from the right of the image."

Reply with only these two descriptions, in a few sentences.
"#;

/// Converts a scale factor into the whole percentage stated in the prompt.
pub fn scale_percent(scale_factor: f64) -> i64 {
    (scale_factor * 100.0).round() as i64
}

/// Builds the compose prompt.
pub fn composite_prompt(lighting_hint: &str, placement_description: &str, scale_factor: f64) -> String {
    let scale = scale_percent(scale_factor);
    format!(
        r#"
**Role**
You are a visual composition expert specializing in jewelry. Integrate the jewelry piece from the first image into the scene, matching perspective, lighting, reflections and scale so the result reads as one photograph.

**Inputs**
- Jewelry piece: the first image. Ignore its background and any padding; treat non-jewelry areas as transparent and keep fine edges intact.
- Scene (clean): the second image. Ignore any padding.
- Scene (marked): the third image is the same scene with a red circular marker over the placement region. It is a spatial hint only; the red marker must never appear in the output.

**Local Lighting Hint**
- {lighting_hint}
- Use it for the white balance and tint of metal and stones, the color of highlights, and the amount of blur needed to match the local depth of field.

**Placement (Critical)**
- Place the jewelry exactly at the location described below, and only once.
- Jewelry placement description: "{placement_description}"

**Replacement Rule (Critical)**
- If the placement region overlaps existing jewelry (earring, stud, hoop, ring, necklace, pendant, chain, bracelet, bangle, piercing), remove the existing item completely and put the new one in its place.
- Never stack or overlay. Old and new jewelry must not both be visible; exactly one item remains.
- Earrings: attach at the piercing. Remove any existing stud, hoop, drop or clip entirely; keep the piercing hole and realistic contact and occlusion with the ear and hair.
- Rings: remove any existing ring or band; wrap the new ring around the finger with correct occlusion, letting the finger hide the inner band where appropriate.
- Necklaces: remove any existing chain, pendant or choker; drape the new chain naturally along the neck and collarbone, occluded by hair and clothing where they overlap.
- Bracelets: remove any existing bracelet or bangle; wrap the new bracelet around the wrist with correct occlusion.

**Jewelry Rendering Requirements**
- Keep delicate details: chains, prongs, clasps, filigree and fine contours. No halos or matte cut-out edges.
- Use the provided design as-is. Do not invent or alter geometry, silhouette or materials; apply only physically plausible relighting and reflections. If the product photo shows a pair, use the single item that fits the placement.
- Metals: match the material and finish (gold, silver, platinum, rose gold) with realistic specular highlights driven by the scene lighting.
- Gemstones and diamonds: keep their color, facets, dispersion and sparkle without blowing out; align highlights with the scene's light direction.
- Shadows and contact: add accurate contact shadows and occlusion where the jewelry touches a surface, skin or fabric, softened according to distance and light size.
- Surfaces: on glossy surfaces such as marble or lacquer add a subtle blurred reflection; on fabric or wood make the piece rest correctly with slight indentation where plausible.
- Skin and clothing: follow the curvature, add micro-occlusion along the contact line, never let the piece float.
- Scale: start from realistic proportions (a ring to a finger, an earring to an ear, a pendant to the collarbone, a bracelet to a wrist), then set the final jewelry size to approximately {scale}% of that realistic size.

**Global Requirements**
- Match the scene's perspective, white balance, noise, grain and depth of field. Re-render to fit; do not paste.
- Add a subtle 2-4 px light wrap of the surrounding scene color around the jewelry edges and match the scene's noise level. If the local area is soft, soften the jewelry to the same degree.
- Returning the original scene without the jewelry is invalid. The output must show the jewelry at the specified location.

Output only the composed image (no text).
"#
    )
}
